use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct SeedCmd {
    #[arg(
        long,
        default_value_t = 10usize,
        value_name = "N",
        help = "Number of users to create (the first three are nick, capt and hulk)"
    )]
    pub users: usize,

    #[arg(
        long,
        default_value_t = 14u32,
        value_name = "DAYS",
        help = "Create one sleep record per user for each of the last DAYS nights"
    )]
    pub days: u32,

    #[arg(
        long,
        default_value_t = 3usize,
        value_name = "N",
        help = "How many other users each user follows"
    )]
    pub follows: usize,

    #[arg(
        long,
        value_name = "SEED",
        help = "Seed for the random generator, for reproducible data"
    )]
    pub seed: Option<u64>,
}
