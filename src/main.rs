fn main() -> anyhow::Result<()> {
    revisit::cli::run()
}
