/// Actions an observer can take during a nonlinear solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solver early, keeping the last accepted iterate.
    StopEarly,
}
