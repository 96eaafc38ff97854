use std::rc::Rc;
use std::time::{Duration, Instant};

use clap::Parser;

use pathsynth::config::Settings;
use pathsynth::model::ModelArena;
use pathsynth::synthesis::Synthesizer;
use pathsynth::test_support::{shared_solver, FooFixture};

#[derive(Debug, Parser)]
#[command(author, version)]
struct Cli {
    /// Values of `x` to synthesize `Foo` objects for.
    #[arg(value_name = "INT", default_values_t = [5])]
    values: Vec<i64>,

    /// Maximal number of calls in a plan.
    #[clap(long, value_name = "INT", default_value = "4")]
    depth: usize,

    /// Time budget in seconds.
    #[clap(long, value_name = "SECONDS", default_value = "60")]
    timeout: u64,

    /// Enable debug logging.
    #[clap(long)]
    debug: bool,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    simplelog::TermLogger::init(
        if args.debug {
            simplelog::LevelFilter::Debug
        } else {
            simplelog::LevelFilter::Info
        },
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = Instant::now();
    println!("args = {:?}", args);

    let mut fixture = FooFixture::new();
    let mut arena = ModelArena::new();
    let roots: Vec<_> = args
        .values
        .iter()
        .enumerate()
        .map(|(i, &value)| fixture.target(&mut arena, &format!("p{}", i), value))
        .collect();
    for &root in &roots {
        println!("target {} = {}", root, arena.render(root));
    }
    let targets = Rc::new(arena);

    let settings = Rc::new(Settings::default());
    let mut synthesizer = Synthesizer::new(settings, shared_solver(), fixture.engine.catalog());
    let result = synthesizer.synthesize_within(
        &mut fixture.engine,
        &targets,
        &roots,
        args.depth,
        Duration::from_secs(args.timeout),
    );

    for (i, model) in result.models.iter().enumerate() {
        match model {
            Some(id) => println!("p{} = {}", i, result.arena.render(*id)),
            None => println!("p{} = <not synthesized>", i),
        }
    }
    let stats = synthesizer.stats();
    println!(
        "{} of {} clusters synthesized ({:.0}%)",
        stats.successes,
        stats.attempts,
        100.0 * stats.success_rate()
    );

    let time_total = time_total.elapsed();
    println!("Done in {:.3} s", time_total.as_secs_f64());

    Ok(())
}
