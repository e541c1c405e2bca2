use clap::Subcommand;

use crate::cli::seed_cmd::SeedCmd;

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Populate the database with demo data",
        long_about = "Create users, follow relationships and randomised sleep records (5 to 10 hours per night) so the list endpoints have something to page through."
    )]
    Seed(SeedCmd),
}
