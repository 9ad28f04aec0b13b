//! Line-oriented command shell driving a [`DirectoryController`].

use std::io::{BufRead, Write};

use tokio::sync::mpsc;

use crate::controller::DirectoryController;
use crate::path::{normalize, NavigationPath};
use crate::presenter::breadcrumb_line;
use crate::state::UploadId;
use crate::utils::{format_bytes, format_speed};

pub const HELP: &str = "\
commands:
  ls                   reload the current directory
  cd <path>            enter a directory (relative, or absolute with a leading /)
  up | cd ..           go to the parent directory
  mkdir <name>         create a folder here
  mv <path> <name>     rename an entry
  rm <path>            delete an entry
  put <file>...        upload local files here
  uploads              show running uploads
  cancel <id>          cancel an upload
  get <path>           download a file
  quit                 leave";

/// forward stdin lines from a dedicated thread.
///
/// the thread is detached: a read blocked on the terminal never holds up
/// runtime shutdown. it ends on eof or once the receiver is dropped.
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// relative to the current directory unless it starts with a slash
pub fn resolve(current: &NavigationPath, target: &str) -> NavigationPath {
    if target.starts_with('/') {
        normalize(target)
    } else {
        current.join(target)
    }
}

fn prompt(controller: &DirectoryController) {
    print!("{} > ", breadcrumb_line(&controller.current_path()));
    let _ = std::io::stdout().flush();
}

async fn confirm(input: &mut mpsc::UnboundedReceiver<String>, question: &str) -> bool {
    print!("{} [y/N] ", question);
    let _ = std::io::stdout().flush();
    matches!(input.recv().await, Some(answer) if answer.trim().eq_ignore_ascii_case("y"))
}

/// read and run commands until `quit` or the end of input
pub async fn run_shell(controller: &DirectoryController, mut input: mpsc::UnboundedReceiver<String>) {
    loop {
        prompt(controller);
        let Some(line) = input.recv().await else {
            break;
        };

        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        let current = controller.current_path();

        // failures are already shown by the presenter
        match command {
            "ls" => {
                let _ = controller.list().await;
            }
            "cd" => match args.first() {
                Some(&"..") => {
                    let _ = controller.up().await;
                }
                Some(target) => {
                    let _ = controller.navigate(resolve(&current, target)).await;
                }
                None => {
                    let _ = controller.navigate(NavigationPath::root()).await;
                }
            },
            "up" => {
                let _ = controller.up().await;
            }
            "mkdir" => {
                let _ = controller.create_folder(&args.join(" ")).await;
            }
            "mv" => match args.as_slice() {
                [target, new_name] => {
                    let _ = controller
                        .rename_entry(resolve(&current, target), new_name)
                        .await;
                }
                _ => eprintln!("usage: mv <path> <new-name>"),
            },
            "rm" => match args.first() {
                Some(target) => {
                    let path = resolve(&current, target);
                    let name = path.file_name().unwrap_or_default().to_string();
                    if confirm(&mut input, &format!("Delete \"{}\" permanently?", name)).await {
                        let _ = controller.delete(path).await;
                    }
                }
                None => eprintln!("usage: rm <path>"),
            },
            "put" => {
                // transfers keep running in the background
                let _ = controller.upload_paths(args.as_slice()).await;
            }
            "uploads" => {
                let tasks = controller.uploads().tasks();
                if tasks.is_empty() {
                    println!("no uploads running");
                }
                for task in tasks {
                    let progress = task
                        .progress
                        .as_ref()
                        .map(|p| format!("{} {}", format_bytes(p.loaded), format_speed(p.speed)))
                        .unwrap_or_default();
                    println!(
                        "{}  {}  {}  {}",
                        task.id,
                        task.source.file_name,
                        task.status.label(),
                        progress
                    );
                }
            }
            "cancel" => match args.first() {
                Some(id) => {
                    if !controller.cancel_upload(&UploadId::from(*id)) {
                        eprintln!("no running upload {}", id);
                    }
                }
                None => eprintln!("usage: cancel <id>"),
            },
            "get" => match args.first() {
                Some(target) => {
                    if let Ok(saved) = controller.download(resolve(&current, target)).await {
                        println!("saved to {:?}", saved);
                    }
                }
                None => eprintln!("usage: get <path>"),
            },
            "help" => println!("{}", HELP),
            "quit" | "exit" => break,
            other => eprintln!("unknown command {:?}, try `help`", other),
        }
    }
}
