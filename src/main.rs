mod cli;

use std::io::{self, Write};
use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::style::Stylize;
use tokio::sync::mpsc;

use actionctl::action::Confirmation;
use actionctl::config::AppConfig;
use actionctl::controller::{ActionController, ResultCallbacks};
use actionctl::invoker::{ActionInvoker, DownloadNavigator, SelectedRows};
use actionctl::logging;
use actionctl::presentation::TerminalPresenter;
use actionctl::streams::WebSocketOpener;
use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse_args();
    let config = AppConfig::load(cli.config.as_deref())?;
    let guard = logging::init(&cli.log_level(&config), config.general.log_file.as_deref())?;

    let endpoints = cli.endpoints(&config)?;
    let invoker = ActionInvoker::new(endpoints.action_url, endpoints.row_action_url)?;
    let navigator = DownloadNavigator::new(invoker.http_client().clone(), cli.output.clone());
    let invoker = invoker
        .with_param_appender(Arc::new(SelectedRows::new(cli.pks.clone())))
        .with_navigator(Arc::new(navigator));
    let opener = WebSocketOpener::new(endpoints.page_url)?;

    // true on success
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<bool>();
    let error_tx = result_tx.clone();
    let callbacks = ResultCallbacks::new(
        move |name, _trigger, message| {
            println!("{} {}: {}", "✓".green(), name, message);
            let _ = result_tx.send(true);
        },
        move |name, _trigger, message| {
            eprintln!("{} {}: {}", "✗".red(), name, message);
            let _ = error_tx.send(false);
        },
    );

    let controller = ActionController::new(Arc::new(invoker), Arc::new(opener), callbacks);
    let handle = controller.handle();
    let presenter = TerminalPresenter::new(handle.clone(), cli.presenter_options(&config));
    let run = tokio::spawn(controller.with_presenter(Box::new(presenter)).run());

    match cli.confirmation() {
        Some(confirmation) => {
            handle.request_confirmation(cli.request(), confirmation.clone())?;
            if prompt_confirmation(confirmation).await? {
                let form = cli.form_payload();
                handle.confirm((!form.is_empty()).then_some(form))?;
            } else {
                handle.cancel_confirmation()?;
                handle.shutdown()?;
                run.await?;
                eprintln!("Cancelled");
                return Ok(());
            }
        }
        None => handle.trigger(cli.request())?,
    }

    let succeeded = tokio::select! {
        result = result_rx.recv() => {
            // None: a custom response unloaded the controller
            result.unwrap_or(true)
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted");
            false
        }
    };

    let _ = handle.shutdown();
    run.await?;

    if !succeeded {
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn prompt_confirmation(confirmation: Confirmation) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || -> io::Result<String> {
        let mut stderr = io::stderr();
        writeln!(stderr, "{}", confirmation.message.as_str().bold())?;
        write!(stderr, "{} [y/N] ", confirmation.submit_label)?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await??;

    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
