use clap::Parser;
use training::util::{init_tracing, run_eval, EvalArgs};

fn main() -> anyhow::Result<()> {
    init_tracing();
    let metrics = run_eval(EvalArgs::parse())?;
    for (name, value) in &metrics {
        println!("{name}: {value:.4}");
    }
    Ok(())
}
