use mongodb::{Client, Database};
use mongodb::bson::doc;
use rocket::fairing::AdHoc;

pub mod jobs;

pub use jobs::{find_user, insert_job, load_job, parse_id, save_job, JOBS};

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected to '{}'", database.name());
                rocket.manage(database)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = crate::config::Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    client
        .database("admin")
        .run_command(doc! { "ping": 1 }, None)
        .await?;

    Ok(client.database(&crate::config::Config::database_name()))
}

pub type DbConn = Database;
