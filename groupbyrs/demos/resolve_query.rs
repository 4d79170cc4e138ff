use std::{env, fs, process};

use groupby::{
    config::ResolverConfig, load_lookup, telemetry::init_tracing, QueryParser, QueryRequest,
};

fn main() -> anyhow::Result<()> {
    let mut args = env::args().skip(1);
    let manifest_dir = args.next().unwrap_or_else(|| "demos/manifest".to_string());
    let request_path = args
        .next()
        .unwrap_or_else(|| "demos/requests/bookings_by_country.json".to_string());

    let config = ResolverConfig::load_default();
    init_tracing(&config.logging)?;

    let lookup = load_lookup(&manifest_dir)?;
    let request: QueryRequest = serde_json::from_str(&fs::read_to_string(&request_path)?)?;

    let parser = QueryParser::new(&lookup, &config);
    let resolution = parser.resolve_query(&request)?;
    match resolution.query_spec {
        Some(spec) => println!("{}", serde_json::to_string_pretty(&spec)?),
        None => {
            eprintln!("{}", resolution.input_to_issue_set.render());
            process::exit(1);
        }
    }
    Ok(())
}
