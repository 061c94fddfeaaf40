//! Example: Convert a CSV file to Parquet in bounded memory
//!
//! Run with:
//! ```bash
//! RUST_LOG=parquetstream=debug cargo run --example csv_to_parquet -- data.csv [output.parquet] [batch_size]
//! ```

use parquetstream::{ConversionJob, Converter, DEFAULT_BATCH_SIZE};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let source = args.next().unwrap_or_else(|| "data.csv".to_string());
    let destination = args.next();
    let batch_size = match args.next() {
        Some(size) => size.parse()?,
        None => DEFAULT_BATCH_SIZE,
    };

    let mut job = ConversionJob::new(&source).batch_size(batch_size);
    if let Some(ref destination) = destination {
        job = job.destination(destination);
    }

    let converter = Converter::new(job)?;
    println!("Input:  {}", source);
    println!("Output: {}\n", converter.destination().display());

    let summary = converter.run_with_progress(|rows, groups| {
        println!("   {} rows in {} row groups", rows, groups);
    })?;

    println!("\nConversion complete");
    println!("   Rows written: {}", summary.rows_written);
    println!("   Schema:       {}", summary.schema);
    Ok(())
}
