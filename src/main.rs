pub mod backfill;
pub mod config;
pub mod crawler;
pub mod database;
pub mod declare;
pub mod error;
pub mod logging;
pub mod util;

async fn run() -> error::Result<usize> {
    let app = config::App::get()?;
    backfill::stock_symbol::execute(&app).await
}

fn failure_message(why: &error::Error) -> String {
    format!("Failed to seed stock symbols because {}", why)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let result = run().await;
    if let Err(why) = &result {
        logging::error_file_async(failure_message(why));
    }

    logging::flush();

    if result.is_err() {
        std::process::exit(1);
    }
}
