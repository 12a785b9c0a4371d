use anyhow::Result;

fn main() -> Result<()> {
    hydra::run()?;
    Ok(())
}
