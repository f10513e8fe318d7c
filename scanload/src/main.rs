//! The `scanload` binary.
//!
//! See [`scanload::cli`] for the available commands.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    scanload::cli::execute()
}
