//! Small helpers for talking to the session streams.

use gitgate_core::GateResult;
use gitgate_core::readwriter::{BoxedReader, BoxedWriter};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Write `text` and flush.
pub(crate) async fn write_text(out: &mut BoxedWriter, text: &str) -> GateResult<()> {
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Read one line from the session input, without the line terminator.
///
/// End of input yields an empty answer.
pub(crate) async fn read_answer(input: &mut BoxedReader) -> GateResult<String> {
    let mut line = String::new();
    BufReader::new(input).read_line(&mut line).await?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}
