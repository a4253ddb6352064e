//! Running one turn against the terminal

use crate::output::stream_printer::spawn_stdout_printer;
use chatstream_application::{
    ChatCompletionError, ChatCompletionInput, ChatCompletionOutput, ChatCompletionStreamUseCase,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Execute a turn, streaming the reply to stdout.
///
/// Ctrl-C while the turn runs cancels it; nothing is saved in that case.
pub async fn stream_turn_to_stdout(
    use_case: &ChatCompletionStreamUseCase,
    input: ChatCompletionInput,
    sink_buffer: usize,
) -> Result<ChatCompletionOutput, ChatCompletionError> {
    let (tx, rx) = mpsc::channel(sink_buffer.max(1));
    let printer = spawn_stdout_printer(rx);

    let cancellation = CancellationToken::new();
    let interrupt = {
        let token = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        })
    };

    let result = use_case.execute(input, &tx, &cancellation).await;
    interrupt.abort();

    // Closing the sink lets the printer finish the line
    drop(tx);
    match printer.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!("Could not write reply to stdout: {}", e),
        Err(e) => warn!("Printer task failed: {}", e),
    }

    result
}
