use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use juicebox_deck::config::Config;
use juicebox_deck::controller::DirectoryController;
use juicebox_deck::presenter::TerminalPresenter;
use juicebox_deck::shell::{run_shell, stdin_lines};
use juicebox_deck::utils::shutdown_signal;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    let config = Config::from_env();

    // one thread: ui events and network callbacks never run at the same time
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    runtime.block_on(async {
        // logs go to stderr so they don't mix with listings
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();

        let presenter = Arc::new(TerminalPresenter::new());
        let controller = match DirectoryController::new(&config, presenter) {
            Ok(controller) => controller,
            Err(e) => {
                eprintln!("❌ {}", e);
                return;
            }
        };

        print_startup_banner(&config);
        let _ = controller.navigate(config.start_path.clone()).await;

        tokio::select! {
            _ = run_shell(&controller, stdin_lines()) => {}
            _ = shutdown_signal() => println!(),
        }

        for id in controller.uploads().ids() {
            controller.cancel_upload(&id);
        }
        tracing::info!("Bye");
    });

    // don't wait for in-flight blocking work on the way out
    runtime.shutdown_background();
}

fn print_startup_banner(config: &Config) {
    println!("juicebox-deck");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("📡 API: {}", config.api_url);
    println!("📁 Downloads go to: {:?}", config.download_dir);
    println!("   type `help` for commands");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
