use clap::Parser;
use training::util::{init_tracing, run_train, TrainArgs};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let summary = run_train(TrainArgs::parse())?;
    for (name, value) in &summary.test {
        println!("{name}: {value:.4}");
    }
    Ok(())
}
