#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressPhase {
    Building,
    Linking,
    Checking,
    Publishing,
}

impl ProgressPhase {
    pub fn label(&self) -> &'static str {
        match self {
            ProgressPhase::Building => "Building trees",
            ProgressPhase::Linking => "Linking references",
            ProgressPhase::Checking => "Checking collisions",
            ProgressPhase::Publishing => "Publishing artifact",
        }
    }
}

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Started {
        phase: ProgressPhase,
        total: usize,
    },
    Progress {
        phase: ProgressPhase,
        current: usize,
        file: Option<String>,
    },
    Finished {
        phase: ProgressPhase,
    },
    Error(String),
}
