/// One command between pipe operators: the argument vector (program name
/// first) plus at most one input and one output redirection target.
///
/// Immutable once produced; owned by the runner that parsed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub argv: Vec<String>,
    pub stdin_path: Option<String>,
    pub stdout_path: Option<String>,
}

impl Segment {
    pub fn is_empty(&self) -> bool {
        self.argv.is_empty()
    }
}
