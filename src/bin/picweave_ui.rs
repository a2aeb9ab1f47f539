//! picweave - Graphical User Interface
//!
//! Single-screen batch tool: pick .docx files, choose where the rewritten
//! copies go, and watch per-document progress and a log of outcomes while
//! the batch runs on a worker thread.

use iced::widget::{
    button, checkbox, column, container, progress_bar, row, rule, scrollable, text, text_input,
};
use iced::{Center, Element, Fill, Task, Theme};
use picweave::fetch::HttpFetcher;
use picweave::pipeline::{self, OutputPolicy};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> iced::Result {
    iced::application(App::new, App::update, App::view)
        .theme(App::theme)
        .centered()
        .run()
}

// ============================================================================
// App State
// ============================================================================

struct App {
    files: Vec<PathBuf>,

    // Output settings
    use_out_dir: bool,
    out_dir: String,
    suffix: String,

    // Task state
    cancel: Arc<AtomicBool>,
    is_running: bool,
    progress: f32,
    progress_completed: usize,
    progress_total: usize,
    progress_rewritten: usize,
    progress_unchanged: usize,
    progress_failed: usize,
    status_text: String,
    log_lines: Vec<String>,
}

impl App {
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    fn new() -> (Self, Task<Message>) {
        (
            App {
                files: Vec::new(),
                use_out_dir: false,
                out_dir: String::new(),
                suffix: pipeline::DEFAULT_SUFFIX.to_string(),
                cancel: Arc::new(AtomicBool::new(false)),
                is_running: false,
                progress: 0.0,
                progress_completed: 0,
                progress_total: 0,
                progress_rewritten: 0,
                progress_unchanged: 0,
                progress_failed: 0,
                status_text: String::new(),
                log_lines: Vec::new(),
            },
            Task::none(),
        )
    }

    fn policy(&self) -> OutputPolicy {
        if self.use_out_dir && !self.out_dir.is_empty() {
            OutputPolicy::Directory(PathBuf::from(&self.out_dir))
        } else {
            OutputPolicy::Suffix(self.suffix.clone())
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone)]
enum Message {
    // File list
    AddFiles,
    FilesSelected(Option<Vec<PathBuf>>),
    ClearList,

    // Output settings
    UseOutDirToggled(bool),
    OutDirChanged(String),
    BrowseOutDir,
    OutDirSelected(Option<PathBuf>),
    SuffixChanged(String),

    // Batch control
    Start,
    Cancel,

    // Background task progress
    ProgressUpdate {
        completed: usize,
        total: usize,
        rewritten: usize,
        unchanged: usize,
        failed: usize,
        line: String,
    },
    TaskFinished(Result<String, String>),
}

// ============================================================================
// Update
// ============================================================================

impl App {
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::AddFiles => Task::perform(
                async {
                    let files = rfd::AsyncFileDialog::new()
                        .set_title("Select Word documents")
                        .add_filter("Word Documents", &["docx"])
                        .pick_files()
                        .await;
                    files.map(|picked| {
                        picked
                            .into_iter()
                            .map(|f| f.path().to_path_buf())
                            .collect::<Vec<_>>()
                    })
                },
                Message::FilesSelected,
            ),

            Message::FilesSelected(paths) => {
                if let Some(paths) = paths {
                    let added = paths.len();
                    for path in paths {
                        if !self.files.contains(&path) {
                            self.files.push(path);
                        }
                    }
                    self.log_lines.push(format!(
                        "Added {} file(s); {} in the list.",
                        added,
                        self.files.len()
                    ));
                }
                Task::none()
            }

            Message::ClearList => {
                self.files.clear();
                self.log_lines.push("File list cleared.".to_string());
                Task::none()
            }

            Message::UseOutDirToggled(value) => {
                self.use_out_dir = value;
                Task::none()
            }
            Message::OutDirChanged(value) => {
                self.out_dir = value;
                Task::none()
            }
            Message::BrowseOutDir => Task::perform(
                async {
                    let folder = rfd::AsyncFileDialog::new()
                        .set_title("Select output folder")
                        .pick_folder()
                        .await;
                    folder.map(|f| f.path().to_path_buf())
                },
                Message::OutDirSelected,
            ),
            Message::OutDirSelected(path) => {
                if let Some(path) = path {
                    self.out_dir = path.display().to_string();
                    self.use_out_dir = true;
                }
                Task::none()
            }
            Message::SuffixChanged(value) => {
                self.suffix = value;
                Task::none()
            }

            Message::Start => {
                self.is_running = true;
                self.status_text = "Starting batch...".to_string();
                self.log_lines.clear();
                self.progress = 0.0;
                self.progress_completed = 0;
                self.progress_total = self.files.len();
                self.progress_rewritten = 0;
                self.progress_unchanged = 0;
                self.progress_failed = 0;
                self.cancel.store(false, Ordering::Relaxed);

                let files = self.files.clone();
                let policy = self.policy();
                let cancel = self.cancel.clone();
                Task::run(batch_stream(files, policy, cancel), |msg| msg)
            }

            Message::Cancel => {
                self.cancel.store(true, Ordering::Relaxed);
                // Let TaskFinished reset the state once the worker stops
                self.status_text = "Cancelling...".to_string();
                Task::none()
            }

            Message::ProgressUpdate {
                completed,
                total,
                rewritten,
                unchanged,
                failed,
                line,
            } => {
                self.progress_completed = completed;
                self.progress_total = total;
                self.progress_rewritten = rewritten;
                self.progress_unchanged = unchanged;
                self.progress_failed = failed;
                self.progress = if total > 0 {
                    completed as f32 / total as f32
                } else {
                    0.0
                };
                self.log_lines.push(line);
                Task::none()
            }

            Message::TaskFinished(result) => {
                self.is_running = false;
                match result {
                    Ok(summary) => {
                        self.status_text = summary.clone();
                        self.log_lines.push(summary);
                    }
                    Err(e) => {
                        self.status_text = format!("Error: {}", e);
                        self.log_lines.push(format!("ERROR: {}", e));
                    }
                }
                self.progress = 0.0;
                Task::none()
            }
        }
    }
}

// ============================================================================
// View
// ============================================================================

impl App {
    fn view(&self) -> Element<'_, Message> {
        let disabled = self.is_running;

        let title = text("picweave").size(28);
        let subtitle = text("Replace markdown image links in Word documents with the images").size(14);

        // File selection
        let mut add = button(text("Add Word documents...").size(13));
        let mut clear = button(text("Clear list").size(13));
        if !disabled {
            add = add.on_press(Message::AddFiles);
            clear = clear.on_press(Message::ClearList);
        }
        let pickers = row![add, clear].spacing(10);

        let file_list: Element<'_, Message> = if self.files.is_empty() {
            text("-- no files selected --")
                .size(13)
                .color(iced::Color::from_rgb(0.6, 0.6, 0.6))
                .into()
        } else {
            let rows: Vec<Element<'_, Message>> = self
                .files
                .iter()
                .map(|path| {
                    let name = path
                        .file_name()
                        .and_then(|s| s.to_str())
                        .unwrap_or("<file>");
                    text(name.to_string()).size(13).into()
                })
                .collect();
            scrollable(column(rows).spacing(2)).height(140).into()
        };

        // Output settings
        let suffix_row = row![
            text("Suffix:").width(130),
            text_input(pipeline::DEFAULT_SUFFIX, &self.suffix)
                .on_input_maybe(if disabled || self.use_out_dir {
                    None
                } else {
                    Some(Message::SuffixChanged)
                })
                .width(160),
            text("(output next to each input)").size(12),
        ]
        .spacing(10)
        .align_y(Center);

        let mut browse = button(text("Browse").size(13));
        if !disabled {
            browse = browse.on_press(Message::BrowseOutDir);
        }
        let out_dir_row = row![
            checkbox(self.use_out_dir)
                .label("Output folder:")
                .on_toggle_maybe(if disabled {
                    None
                } else {
                    Some(Message::UseOutDirToggled)
                }),
            text_input("Select a folder...", &self.out_dir)
                .on_input_maybe(if disabled || !self.use_out_dir {
                    None
                } else {
                    Some(Message::OutDirChanged)
                })
                .width(Fill),
            browse,
        ]
        .spacing(10)
        .align_y(Center);

        // Start/cancel + progress
        let controls = if self.is_running {
            row![
                button(text("Cancel")).on_press(Message::Cancel),
                text(&self.status_text).size(13),
            ]
            .spacing(10)
            .align_y(Center)
        } else {
            let mut start = button(text("Start batch"));
            if !self.files.is_empty() {
                start = start.on_press(Message::Start);
            }
            let mut controls = row![start].spacing(10);
            if !self.status_text.is_empty() {
                controls = controls.push(text(&self.status_text).size(13));
            }
            controls.align_y(Center)
        };

        let progress_section = if self.is_running {
            let counts = format!(
                "{}/{} ({} rewritten, {} unchanged, {} failed)",
                self.progress_completed,
                self.progress_total,
                self.progress_rewritten,
                self.progress_unchanged,
                self.progress_failed
            );
            column![
                progress_bar(0.0..=1.0, self.progress),
                text(counts).size(13),
            ]
            .spacing(4)
        } else {
            column![]
        };

        // Log pane
        let log = if !self.log_lines.is_empty() {
            let log_text: String = self
                .log_lines
                .iter()
                .rev()
                .take(100)
                .rev()
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            column![
                text("Log:").size(13),
                scrollable(container(text(log_text).size(12)).padding(8)).height(180),
            ]
            .spacing(4)
        } else {
            column![]
        };

        let body = column![
            title,
            subtitle,
            rule::horizontal(1),
            pickers,
            file_list,
            rule::horizontal(1),
            suffix_row,
            out_dir_row,
            controls,
            progress_section,
            log,
        ]
        .spacing(12);

        container(body).padding(20).width(Fill).height(Fill).into()
    }
}

// ============================================================================
// Worker
// ============================================================================

/// Run the batch on a worker thread and stream progress updates to the UI.
///
/// Returns a stream of `Message` values: `ProgressUpdate` per document and a
/// final `TaskFinished` when complete or cancelled.
fn batch_stream(
    files: Vec<PathBuf>,
    policy: OutputPolicy,
    cancel: Arc<AtomicBool>,
) -> impl futures::Stream<Item = Message> {
    let (tx, rx) = futures::channel::mpsc::unbounded();

    std::thread::spawn(move || {
        let fetcher = match HttpFetcher::new() {
            Ok(fetcher) => fetcher,
            Err(e) => {
                let _ = tx.unbounded_send(Message::TaskFinished(Err(format!(
                    "Failed to build HTTP client: {}",
                    e
                ))));
                return;
            }
        };

        let summary = pipeline::process_all(&files, &policy, &fetcher, |progress| {
            let _ = tx.unbounded_send(Message::ProgressUpdate {
                completed: progress.completed,
                total: progress.total,
                rewritten: progress.rewritten,
                unchanged: progress.unchanged,
                failed: progress.failed,
                line: progress.line.clone(),
            });
            !cancel.load(Ordering::Relaxed)
        });

        let _ = tx.unbounded_send(Message::TaskFinished(Ok(summary.summary_line())));
    });

    rx
}
