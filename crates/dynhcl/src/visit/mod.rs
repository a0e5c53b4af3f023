//! visitor pattern helpers
mod visit_variables;
pub(crate) use visit_variables::VisitVariables;

/// Visitor that visits its subjects by shared reference
pub(crate) trait Visit<T> {
    fn visit(&mut self, value: &T);
}

// blanket impl for FnMut
impl<T, F> Visit<T> for F
where
    F: FnMut(&T),
{
    fn visit(&mut self, value: &T) {
        self(value)
    }
}
