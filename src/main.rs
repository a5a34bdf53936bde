use anyhow::Context;
use scent_checkout::{
    application::{
        services::{FlowSettings, PaymentFlowController},
        use_cases::CheckoutUseCase,
    },
    config::AppConfig,
    domain::{
        format_countdown, CheckoutHost, CloseReason, Currency, FlowState, PaymentGateway,
        PaymentSession, PaymentView,
    },
    infrastructure::adapters::PaymentApiAdapter,
    shared::{logging::LoggingUtils, metrics::FlowMetrics, AppError},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{error, info};

/// How the terminal session ended
#[derive(Debug)]
enum Outcome {
    Paid { order_id: String },
    Closed(CloseReason),
}

/// Host that reports flow callbacks back to the command loop
struct TerminalHost {
    outcomes: UnboundedSender<Outcome>,
}

impl TerminalHost {
    fn new() -> (Arc<Self>, UnboundedReceiver<Outcome>) {
        let (outcomes, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { outcomes }), receiver)
    }
}

impl CheckoutHost for TerminalHost {
    fn on_success(&self, session: &PaymentSession) {
        let _ = self.outcomes.send(Outcome::Paid {
            order_id: session.order_id().to_string(),
        });
    }

    fn on_close(&self, reason: CloseReason) {
        let _ = self.outcomes.send(Outcome::Closed(reason));
    }
}

fn print_view(view: &PaymentView) {
    println!();
    println!("Order {}  ({})", view.order_id, view.state);
    println!("Total: Rp {:.0}", view.amount_fiat);
    match (&view.amount_crypto, &view.wallet_address) {
        (Some(amount), Some(address)) => {
            println!("Send exactly {} {} to", amount, view.currency);
            println!("  {}", address);
            if let Some(uri) = &view.payment_uri {
                println!("Wallet link: {}", uri);
            }
        }
        _ => println!("Payment currency: {} (address pending)", view.currency),
    }
    if let Some(rate) = &view.rate {
        println!("Rate: {}", rate);
    }
    println!("Time remaining: {}", format_countdown(view.remaining_seconds));
    println!("Commands: sol | usdt | status | retry | metrics | cancel");
}

fn print_error(e: &AppError) {
    match e {
        AppError::InitializationFailed(_) => {
            println!("Could not create the payment ({}). Type `retry` or `cancel`.", e)
        }
        _ => println!("Error: {}", e),
    }
}

async fn handle_command(controller: &PaymentFlowController, metrics: &FlowMetrics, command: &str) {
    let result = match command {
        "sol" | "usdt" => match command.parse::<Currency>() {
            Ok(currency) => controller.switch_currency(currency).await.map(Some),
            Err(e) => Err(e),
        },
        "retry" => controller.retry().await.map(Some),
        "status" => Ok(controller.view()),
        "metrics" => {
            match metrics.render() {
                Ok(text) => print!("{}", text),
                Err(e) => print_error(&e),
            }
            return;
        }
        "cancel" | "quit" | "exit" => {
            controller.cancel();
            return;
        }
        "" => return,
        other => {
            println!("Unknown command: {}", other);
            return;
        }
    };

    match result {
        Ok(Some(view)) => print_view(&view),
        Ok(None) => println!("No payment in progress"),
        Err(e) => print_error(&e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load configuration")?;
    LoggingUtils::initialize(&config.logging.level, &config.logging.format)
        .context("Failed to initialize logging")?;

    info!(backend = %config.backend.base_url, "Starting checkout");

    let gateway: Arc<dyn PaymentGateway> = Arc::new(
        PaymentApiAdapter::from_config(&config.backend).context("Failed to create backend client")?,
    );
    let table = Arc::new(config.conversion_table()?);
    let metrics = Arc::new(FlowMetrics::new()?);
    let settings = FlowSettings::from_config(&config)?;
    let (host, mut outcomes) = TerminalHost::new();

    let controller = Arc::new(PaymentFlowController::new(
        gateway.clone(),
        table,
        host,
        metrics.clone(),
        settings,
    ));
    let checkout = CheckoutUseCase::new(gateway, controller.clone());

    match checkout.execute(None).await {
        Ok((_, view)) => print_view(&view),
        Err(e @ AppError::InitializationFailed(_)) => print_error(&e),
        Err(e) => {
            error!(error = %e, "Checkout failed");
            return Err(e).context("Checkout failed");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reminder = tokio::time::interval(Duration::from_secs(60));
    reminder.tick().await;

    let outcome = loop {
        tokio::select! {
            outcome = outcomes.recv() => break outcome,
            line = lines.next_line() => match line? {
                Some(line) => {
                    handle_command(&controller, &metrics, line.trim().to_lowercase().as_str()).await;
                }
                None => {
                    controller.cancel();
                    break outcomes.try_recv().ok();
                }
            },
            _ = reminder.tick() => {
                if let Some(view) = controller.view() {
                    if view.state == FlowState::AwaitingPayment {
                        println!("Waiting for payment... {} left", format_countdown(view.remaining_seconds));
                    }
                }
            }
        }
    };

    match outcome {
        Some(Outcome::Paid { order_id }) => {
            println!("Payment received. Order {} is confirmed, your cart has been cleared.", order_id)
        }
        Some(Outcome::Closed(CloseReason::Expired)) => {
            println!("The payment window has closed. Start a new checkout to try again.")
        }
        Some(Outcome::Closed(CloseReason::Cancelled)) => println!("Payment cancelled."),
        None => {}
    }

    controller.shutdown();
    info!(summary = ?metrics.summary(), "Checkout finished");
    Ok(())
}
