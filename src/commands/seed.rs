use anyhow::{Context as AnyhowContext, Result};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use super::CommandRunner;
use crate::cli;
use crate::context::{self, unix_now};
use crate::storage::{
    traits::{NewSleepRecord, StorageTx, StorageWrite},
    SqliteStorage, Storage,
};

const NAMED_USERS: [&str; 3] = ["nick@gmail.com", "capt@gmail.com", "hulk@gmail.com"];
const DAY: i64 = 24 * 60 * 60;
const MIN_SLEEP: i64 = 5 * 60 * 60;
const MAX_SLEEP: i64 = 10 * 60 * 60;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users: usize,
    pub follows: usize,
    pub sleep_records: usize,
}

impl CommandRunner for cli::SeedCmd {
    fn run(&self, ctx: &context::Context) -> Result<()> {
        let storage = SqliteStorage::new(ctx.config.db_path());
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let report = seed(&storage, self, &mut rng, unix_now()).context("seeding database")?;
        log::info!(
            "🌱 Seeded {} users, {} follows, {} sleep records",
            report.users,
            report.follows,
            report.sleep_records
        );
        println!(
            "users={} follows={} sleep_records={}",
            report.users, report.follows, report.sleep_records
        );
        Ok(())
    }
}

/// Writes one transaction of demo data: `plan.users` users, up to
/// `plan.follows` followed users each, and one closed sleep record per user
/// for every night in the last `plan.days` days.
pub fn seed<S: Storage>(
    storage: &S,
    plan: &cli::SeedCmd,
    rng: &mut impl Rng,
    now: i64,
) -> Result<SeedReport> {
    let tx = storage.begin_tx()?;
    let mut report = SeedReport::default();

    let mut user_ids = Vec::with_capacity(plan.users);
    for i in 0..plan.users {
        let email = match NAMED_USERS.get(i) {
            Some(named) => named.to_string(),
            None => format!("user{i}@example.com"),
        };
        user_ids.push(tx.upsert_user(&email, now)?);
    }
    report.users = user_ids.len();

    for &follower in &user_ids {
        let others: Vec<i64> = user_ids.iter().copied().filter(|&id| id != follower).collect();
        for &followed in others.choose_multiple(rng, plan.follows) {
            if tx.insert_follow(follower, followed, now)? {
                report.follows += 1;
            }
        }
    }

    for &user_id in &user_ids {
        for night in 1..=i64::from(plan.days) {
            // bedtime somewhere between 21:00 and 01:00 relative to the day boundary
            let clock_in = now - night * DAY + rng.gen_range(-3 * 3600..=3600);
            let length = rng.gen_range(MIN_SLEEP..=MAX_SLEEP) / 60 * 60;
            tx.insert_sleep_record(&NewSleepRecord {
                user_id,
                clock_in,
                clock_out: Some(clock_in + length),
                created_at: clock_in + length,
            })?;
            report.sleep_records += 1;
        }
    }

    tx.commit()?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{
        testing::{unique_temp_file, FIXTURE_NOW},
        Predicate, Scope,
    };
    use crate::repositories::{sleep_records::SLEEP_RECORDS, users::USERS};
    use crate::storage::StorageRead;

    fn plan(users: usize, days: u32, follows: usize) -> cli::SeedCmd {
        cli::SeedCmd {
            users,
            days,
            follows,
            seed: Some(42),
        }
    }

    fn storage() -> SqliteStorage {
        let storage = SqliteStorage::new(unique_temp_file("sleeplog_seed", "db"));
        storage.init().unwrap();
        storage
    }

    #[test]
    fn seeds_named_users_first() {
        let storage = storage();
        let mut rng = StdRng::seed_from_u64(1);
        let report = seed(&storage, &plan(5, 2, 2), &mut rng, FIXTURE_NOW).unwrap();
        assert_eq!(
            report,
            SeedReport {
                users: 5,
                follows: 10,
                sleep_records: 10
            }
        );

        let rows = storage
            .query_rows(&Scope::new(&USERS).reorder(vec!["id ASC".into()]).select(&["email"]))
            .unwrap();
        let emails: Vec<String> = rows
            .into_iter()
            .filter_map(|row| row[0].as_str().map(str::to_string))
            .collect();
        assert_eq!(
            emails,
            vec![
                "nick@gmail.com",
                "capt@gmail.com",
                "hulk@gmail.com",
                "user3@example.com",
                "user4@example.com"
            ]
        );
    }

    #[test]
    fn sleep_lengths_stay_between_five_and_ten_hours() {
        let storage = storage();
        let mut rng = StdRng::seed_from_u64(2);
        seed(&storage, &plan(3, 7, 1), &mut rng, FIXTURE_NOW).unwrap();

        let too_short_or_long = Scope::new(&SLEEP_RECORDS).filter(Predicate::new(
            "duration < ? OR duration > ?",
            vec![MIN_SLEEP.into(), MAX_SLEEP.into()],
        ));
        assert_eq!(storage.query_count(&too_short_or_long.count()).unwrap(), 0);
        assert_eq!(storage.query_count(&Scope::new(&SLEEP_RECORDS).count()).unwrap(), 21);
    }

    #[test]
    fn follows_are_capped_by_available_users() {
        let storage = storage();
        let mut rng = StdRng::seed_from_u64(3);
        let report = seed(&storage, &plan(2, 0, 5), &mut rng, FIXTURE_NOW).unwrap();
        assert_eq!(report.follows, 2);
        assert_eq!(storage.follow_counts(1).unwrap().followers, 1);
    }

    #[test]
    fn reseeding_keeps_users_and_follows_unique() {
        let storage = storage();
        let mut rng = StdRng::seed_from_u64(4);
        seed(&storage, &plan(3, 1, 2), &mut rng, FIXTURE_NOW).unwrap();
        let again = seed(&storage, &plan(3, 1, 2), &mut rng, FIXTURE_NOW).unwrap();
        assert_eq!(again.users, 3);
        assert_eq!(again.follows, 0);
        assert_eq!(storage.query_count(&Scope::new(&USERS).count()).unwrap(), 3);
    }
}
