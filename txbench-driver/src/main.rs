use anyhow::Result;

fn main() -> Result<()> {
    txbench_driver::cli::execute()
}
