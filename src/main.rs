/// Entry point for the `graft` binary.
fn main() -> anyhow::Result<()> {
    graft::cli::run()
}
