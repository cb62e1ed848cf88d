use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::config::Config;
use crate::inspect;
use crate::relay::{ProcessRunner, SystemRunner};
use crate::translate::{Translation, Translator};

/// Relay a runtime command (`nerdvm run ...`, `nerdvm inspect ...`) into the VM.
///
/// Returns the exit code of the relayed command.
pub async fn cmd_runtime(config: Config, argv: Vec<String>) -> Result<i32> {
    let Some((command, args)) = argv.split_first() else {
        anyhow::bail!("no runtime command given");
    };

    let translator = Translator::for_host(config);
    info!(platform = %translator.platform(), command = %command, "relaying runtime command");

    let translation = translator
        .translate(command, args)
        .with_context(|| format!("translating '{}'", command))?;

    let mut stdout = std::io::stdout();
    run_translation(&SystemRunner, &translation, &mut stdout).await
}

/// Execute a translated command, reconstructing its output when required.
///
/// Reconstruction problems are logged and never change the exit code.
pub async fn run_translation<R, W>(runner: &R, translation: &Translation, out: &mut W) -> Result<i32>
where
    R: ProcessRunner + ?Sized,
    W: Write,
{
    let output = runner
        .run(&translation.invocation, translation.reconstruct_output)
        .await
        .with_context(|| format!("running {}", translation.command))?;

    if let Some(stdout) = output.stdout {
        debug!(bytes = stdout.len(), "reconstructing inspect output");
        inspect::write_normalized(&String::from_utf8_lossy(&stdout), out);
    }

    Ok(output.exit_code)
}
