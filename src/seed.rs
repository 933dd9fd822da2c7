//! Demo data for a fresh library
//!
//! Wipes every book and user, then inserts a random catalog, the
//! well-known admin account and a batch of readers.

use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};

use crate::{
    error::AppResult,
    models::{NewBook, NewUser, Role},
    repository::Repository,
    services::auth::hash_password,
};

pub const ADMIN_NAME: &str = "Admin";
pub const ADMIN_EMAIL: &str = "admin@mail.com";
pub const ADMIN_PASSWORD: &str = "secretpassword1";

/// Copies per seeded book are drawn from `0..MAX_COUNT`
const MAX_COUNT: i32 = 15;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Boris", "Clara", "Dmitri", "Elena", "Farid", "Greta", "Hugo", "Ines", "Jonas",
    "Katja", "Luka", "Marta", "Nils", "Olga", "Pavel", "Rosa", "Stefan", "Tara", "Viktor",
];

const LAST_NAMES: &[&str] = &[
    "Horvat", "Kovac", "Novak", "Lindqvist", "Moreau", "Okafor", "Petrov", "Quinn", "Rossi",
    "Schmidt", "Tanaka", "Varga", "Weber", "Yilmaz", "Zoric",
];

const WORDS: &[&str] = &[
    "river", "shadow", "garden", "winter", "lantern", "harbor", "silent", "empire", "glass",
    "orchard", "storm", "letters", "mountain", "northern", "secret", "summer", "iron", "night",
    "island", "forgotten", "crown", "salt", "voyage", "library", "distant", "ember",
];

/// How much data to generate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedPlan {
    pub books: usize,
    pub users: usize,
}

impl Default for SeedPlan {
    fn default() -> Self {
        Self {
            books: 50,
            users: 30,
        }
    }
}

/// Rows removed and inserted by one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub books_removed: u64,
    pub users_removed: u64,
    pub books_inserted: u64,
    /// Includes the admin account
    pub users_inserted: u64,
}

/// Replace the contents of both stores with generated data
pub async fn run<R: Rng>(
    repository: &Repository,
    plan: SeedPlan,
    rng: &mut R,
) -> AppResult<SeedReport> {
    let books: Vec<NewBook> = (0..plan.books).map(|_| random_book(rng)).collect();

    let mut users = Vec::with_capacity(plan.users + 1);
    users.push(NewUser {
        name: ADMIN_NAME.to_string(),
        email: ADMIN_EMAIL.to_string(),
        password_hash: hash_password(ADMIN_PASSWORD)?,
        role: Role::Admin,
    });
    for index in 0..plan.users {
        users.push(random_reader(rng, index)?);
    }

    // Books first so holdings go with them
    let books_removed = repository.books.clear().await?;
    let users_removed = repository.users.clear().await?;
    tracing::info!(books_removed, users_removed, "Cleared stores");

    let books_inserted = repository.books.insert_many(&books).await?;
    let users_inserted = repository.users.insert_many(&users).await?;
    tracing::info!(books_inserted, users_inserted, "Inserted seed data");

    Ok(SeedReport {
        books_removed,
        users_removed,
        books_inserted,
        users_inserted,
    })
}

fn pick<'a, R: Rng>(rng: &mut R, words: &[&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or_default()
}

fn random_token<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(rng.sample(Alphanumeric))).collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn random_book<R: Rng>(rng: &mut R) -> NewBook {
    let title = format!(
        "The {} {}",
        capitalize(pick(rng, WORDS)),
        capitalize(pick(rng, WORDS))
    );

    let description = (0..rng.gen_range(2..=4))
        .map(|_| {
            let sentence: Vec<&str> = (0..rng.gen_range(6..=12)).map(|_| pick(rng, WORDS)).collect();
            format!("{}.", capitalize(&sentence.join(" ")))
        })
        .collect::<Vec<_>>()
        .join(" ");

    let slug = random_token(rng, 10);

    NewBook {
        title,
        description,
        image_url: format!("https://picsum.photos/seed/{}/300/400", slug),
        count: rng.gen_range(0..MAX_COUNT),
    }
}

/// Index keeps generated addresses unique
fn random_reader<R: Rng>(rng: &mut R, index: usize) -> AppResult<NewUser> {
    let first = pick(rng, FIRST_NAMES);
    let last = pick(rng, LAST_NAMES);
    let password = random_token(rng, 12);

    Ok(NewUser {
        name: format!("{} {}", first, last),
        email: format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            index
        ),
        password_hash: hash_password(&password)?,
        role: Role::User,
    })
}
