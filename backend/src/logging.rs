use tracing::{Event, Subscriber};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "warn,lottery_backend=info,lottery_shared=info";

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{:?}", value));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }
}

struct LotteryLayer;

impl<S: Subscriber> Layer<S> for LotteryLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        if visitor.0.is_empty() {
            return;
        }

        // Bridged `log` records report their module path as target.
        let target = metadata.target();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

        match *metadata.level() {
            tracing::Level::ERROR => {
                eprintln!("[{}] ❌ Error: {} - {}", timestamp, target, visitor.0)
            }
            tracing::Level::WARN => {
                eprintln!("[{}] ⚠️ Warning: {} - {}", timestamp, target, visitor.0)
            }
            tracing::Level::INFO => println!("[{}] ℹ️ {} - {}", timestamp, target, visitor.0),
            tracing::Level::DEBUG => println!("[{}] 🔄 {} - {}", timestamp, target, visitor.0),
            _ => {}
        }
    }
}

/// Installs the global subscriber. `log` records from the lottery core are
/// forwarded into it.
pub fn setup() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let result = Registry::default()
        .with(env_filter)
        .with(LotteryLayer)
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialised: {}", e);
    }
}
