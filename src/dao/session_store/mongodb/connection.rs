use std::time::Duration;

use mongodb::{Client, Database, bson::doc};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

/// Backoff between pings while the quiz database comes up.
struct Backoff;

impl Backoff {
    const MAX_ATTEMPTS: u32 = 10;
    const FIRST: Duration = Duration::from_millis(250);
    const CEILING: Duration = Duration::from_secs(5);

    fn after(current: Duration) -> Duration {
        (current * 2).min(Self::CEILING)
    }
}

/// Open a client on the quiz database and wait until it answers a ping.
///
/// Sessions are only archived once this succeeds; until then the engine keeps
/// serving from memory in degraded mode.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<(Client, Database)> {
    let database_name = config.database_name.as_str();
    let client = Client::with_options(config.options.clone()).map_err(|source| {
        MongoDaoError::ClientConstruction {
            database: database_name.to_owned(),
            source,
        }
    })?;
    let database = client.database(database_name);

    let mut attempts = 0;
    let mut delay = Backoff::FIRST;
    loop {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => break,
            Err(err) => {
                attempts += 1;
                if attempts >= Backoff::MAX_ATTEMPTS {
                    return Err(MongoDaoError::DatabaseUnreachable {
                        database: database_name.to_owned(),
                        attempts,
                        source: err,
                    });
                }
                debug!(database = database_name, attempts, error = %err, "quiz database not reachable yet");
                sleep(delay).await;
                delay = Backoff::after(delay);
            }
        }
    }

    info!(database = database_name, attempts = attempts + 1, "connected to quiz database");
    Ok((client, database))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let mut delay = Backoff::FIRST;
        let mut waits = Vec::new();
        for _ in 1..Backoff::MAX_ATTEMPTS {
            waits.push(delay);
            delay = Backoff::after(delay);
        }
        assert_eq!(waits[1], Duration::from_millis(500));
        assert_eq!(waits.last(), Some(&Duration::from_secs(5)));
        assert!(waits.iter().all(|wait| *wait <= Backoff::CEILING));
    }
}
