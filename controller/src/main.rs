mod diagnostics;
mod host;
mod pwm;
mod store;

use std::process::ExitCode;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    host::run().await
}
