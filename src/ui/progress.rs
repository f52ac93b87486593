use crate::linker::LinkReport;
use crate::ui::progress_message::{ProgressMessage, ProgressPhase};
use crate::ui::theme;
use crate::ui::Icons;
use indicatif::{HumanDuration, MultiProgress, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

fn visible(bar: ProgressBar) -> ProgressBar {
    if console::Term::stdout().is_term() {
        bar
    } else {
        ProgressBar::hidden()
    }
}

/// Terminal display fed by the compiler's progress channel
pub struct ProgressManager {
    mp: MultiProgress,
    handle: Option<thread::JoinHandle<()>>,
}

impl ProgressManager {
    pub fn new(total_files: usize) -> (Self, crossbeam::channel::Sender<ProgressMessage>) {
        let (tx, rx) = crossbeam::channel::unbounded::<ProgressMessage>();

        let mp = MultiProgress::new();
        let building = visible(mp.add(ProgressBar::new(total_files as u64).with_message(ProgressPhase::Building.label())));
        let linking = visible(mp.add(ProgressBar::new_spinner().with_message(ProgressPhase::Linking.label())));
        let checking = visible(mp.add(ProgressBar::new_spinner().with_message(ProgressPhase::Checking.label())));
        let publishing = visible(mp.add(ProgressBar::new_spinner().with_message(ProgressPhase::Publishing.label())));

        let handle = thread::spawn(move || {
            let bar = |phase: ProgressPhase| match phase {
                ProgressPhase::Building => &building,
                ProgressPhase::Linking => &linking,
                ProgressPhase::Checking => &checking,
                ProgressPhase::Publishing => &publishing,
            };

            for msg in rx {
                match msg {
                    ProgressMessage::Started {
                        phase: ProgressPhase::Building,
                        total,
                    } => {
                        building.set_length(total as u64);
                    }
                    ProgressMessage::Started { phase, total: _ } => {
                        bar(phase).enable_steady_tick(Duration::from_millis(100));
                    }
                    ProgressMessage::Progress { phase, current, file } => {
                        let pb = bar(phase);
                        pb.set_position(current as u64);
                        if let Some(ref f) = file {
                            pb.set_message(format!("{}: {}", phase.label(), f));
                        }
                    }
                    ProgressMessage::Finished { phase } => {
                        bar(phase).finish_with_message(format!("{}: done", phase.label()));
                    }
                    ProgressMessage::Error(_) => {
                        for phase in [
                            ProgressPhase::Building,
                            ProgressPhase::Linking,
                            ProgressPhase::Checking,
                            ProgressPhase::Publishing,
                        ] {
                            let pb = bar(phase);
                            if !pb.is_finished() {
                                pb.abandon();
                            }
                        }
                    }
                }
            }
        });

        (
            Self {
                mp,
                handle: Some(handle),
            },
            tx,
        )
    }

    /// Wait for the display thread; every sender must be dropped first
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }

    pub fn clear(&self) {
        self.mp.clear().ok();
    }

    pub fn finish_with_summary(&mut self, duration: Duration, files: usize, trees: usize, report: &LinkReport) {
        self.join();
        self.clear();
        println!();
        println!(
            "{} {}",
            Icons::CHECK.style(theme().success.clone()),
            format!("Compiled in {}", HumanDuration(duration)).style(theme().success.clone())
        );
        println!(
            "  {} {}  {} {}  {} {}",
            Icons::FILE.style(theme().info.clone()),
            files,
            Icons::TREE.style(theme().info.clone()),
            trees,
            Icons::LINK.style(theme().info.clone()),
            report.intra_bound + report.cross_bound
        );
    }
}

pub struct Spinner {
    pb: ProgressBar,
}

impl Spinner {
    pub fn new(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_message(message.to_string());
        if console::Term::stdout().is_term() {
            pb.enable_steady_tick(Duration::from_millis(100));
        }
        Self { pb }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    pub fn finish_with_message(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }

    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }
}
