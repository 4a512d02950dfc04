//! Sample data bootstrap. Runs once: if the sentinel franchise exists nothing is written.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::service::{fetch_optional, CrudService};
use crate::sql::select_list;
use serde_json::{json, Value};
use sqlx::PgConnection;
use sqlx::PgPool;
use std::collections::HashMap;

/// Franchise whose presence marks the database as already seeded.
pub const SENTINEL_FRANCHISE: &str = "Star Wars";

/// Serializes concurrent seed runs for the duration of the transaction.
const SEED_LOCK_KEY: i64 = 0x5357_5345_4544;

const FRANCHISES: &[(&str, &str, i32)] = &[
    ("Star Wars", "Main Skywalker Saga Timeline", 1977),
    ("Star Wars Legends", "Expanded Universe Stories", 1991),
    ("Star Wars Disney+", "Streaming Original Series", 2019),
];

/// (franchise, rating, box office)
const FILMS: &[(&str, &str, i64)] = &[
    ("Star Wars", "PG", 775_398_007),
    ("Star Wars", "PG", 538_375_067),
    ("Star Wars", "PG", 475_106_177),
    ("Star Wars", "PG", 1_027_044_677),
    ("Star Wars", "PG", 653_779_970),
    ("Star Wars", "PG-13", 868_390_560),
    ("Star Wars", "PG-13", 2_068_223_624),
    ("Star Wars", "PG-13", 1_332_539_889),
    ("Star Wars", "PG-13", 1_074_144_248),
    ("Star Wars", "PG-13", 1_056_057_273),
];

/// (franchise, title, start year, end year, seasons)
const TV_SERIES: &[(&str, &str, i32, i32, i32)] = &[
    ("Star Wars", "The Clone Wars", 2008, 2020, 7),
    ("Star Wars", "Star Wars Rebels", 2014, 2018, 4),
    ("Star Wars Disney+", "The Mandalorian", 2019, 2023, 3),
    ("Star Wars Disney+", "The Book of Boba Fett", 2021, 2022, 1),
    ("Star Wars Disney+", "Obi-Wan Kenobi", 2022, 2022, 1),
    ("Star Wars Disney+", "Ahsoka", 2023, 2023, 1),
    ("Star Wars", "Star Wars Resistance", 2018, 2020, 2),
];

/// (franchise, title, publication year, author)
const BOOKS: &[(&str, &str, i32, &str)] = &[
    ("Star Wars Legends", "Heir to the Empire", 1991, "Timothy Zahn"),
    ("Star Wars Legends", "Dark Force Rising", 1992, "Timothy Zahn"),
    ("Star Wars Legends", "The Last Command", 1993, "Timothy Zahn"),
    ("Star Wars", "Thrawn", 2017, "Timothy Zahn"),
    ("Star Wars", "Ahsoka", 2016, "E.K. Johnston"),
    ("Star Wars", "Lost Stars", 2015, "Claudia Gray"),
    ("Star Wars", "Bloodline", 2016, "Claudia Gray"),
    ("Star Wars Legends", "Shadows of the Empire", 1996, "Steve Perry"),
];

const SPECIES: &[(&str, &str)] = &[
    ("Human", "Mammal"),
    ("Twi'lek", "Humanoid"),
    ("Wookiee", "Mammal"),
    ("Droid", "Artificial"),
    ("Togruta", "Humanoid"),
    ("Yoda's Species", "Unknown"),
    ("Gungan", "Amphibian"),
];

const AFFILIATIONS: &[(&str, &str)] = &[
    ("Rebel Alliance", "Resistance against the Empire"),
    ("Galactic Empire", "Authoritarian galactic government"),
    ("Jedi Order", "Ancient order of Force users"),
    ("Sith", "Dark side Force users"),
    ("Galactic Republic", "Democratic galactic government"),
    ("Resistance", "Opposition to the First Order"),
    ("First Order", "Successor to the Galactic Empire"),
];

/// (name, birth year, role)
const PEOPLE: &[(&str, &str, &str)] = &[
    ("Luke Skywalker", "19BBY", "Jedi Knight"),
    ("Darth Vader", "41BBY", "Sith Lord"),
    ("Leia Organa", "19BBY", "Princess"),
    ("Han Solo", "29BBY", "Smuggler"),
    ("Obi-Wan Kenobi", "57BBY", "Jedi Master"),
    ("Yoda", "896BBY", "Jedi Grand Master"),
    ("Anakin Skywalker", "41BBY", "Jedi Knight"),
    ("Padmé Amidala", "46BBY", "Queen"),
    ("Ahsoka Tano", "36BBY", "Former Jedi"),
    ("Chewbacca", "200BBY", "Co-pilot"),
    ("R2-D2", "33BBY", "Astromech Droid"),
    ("C-3PO", "112BBY", "Protocol Droid"),
    ("Rey", "15ABY", "Jedi"),
    ("Ben Solo", "5ABY", "Dark Side User"),
    ("Sheev Palpatine", "84BBY", "Sith Lord"),
];

/// (character, person, species, affiliation)
const CHARACTERS: &[(&str, &str, &str, &str)] = &[
    ("Luke Skywalker", "Luke Skywalker", "Human", "Rebel Alliance"),
    ("Darth Vader", "Darth Vader", "Human", "Galactic Empire"),
    ("Princess Leia", "Leia Organa", "Human", "Rebel Alliance"),
    ("Han Solo", "Han Solo", "Human", "Rebel Alliance"),
    ("Obi-Wan Kenobi", "Obi-Wan Kenobi", "Human", "Jedi Order"),
    ("Yoda", "Yoda", "Yoda's Species", "Jedi Order"),
    ("Anakin Skywalker", "Anakin Skywalker", "Human", "Jedi Order"),
    ("Padmé Amidala", "Padmé Amidala", "Human", "Galactic Republic"),
    ("Ahsoka Tano", "Ahsoka Tano", "Togruta", "Jedi Order"),
    ("Chewbacca", "Chewbacca", "Wookiee", "Rebel Alliance"),
    ("R2-D2", "R2-D2", "Droid", "Rebel Alliance"),
    ("C-3PO", "C-3PO", "Droid", "Rebel Alliance"),
    ("Rey", "Rey", "Human", "Resistance"),
    ("Kylo Ren", "Ben Solo", "Human", "First Order"),
    ("Emperor Palpatine", "Sheev Palpatine", "Human", "Sith"),
];

/// (name, region, climate)
const PLANETS: &[(&str, &str, &str)] = &[
    ("Tatooine", "Outer Rim", "Arid desert"),
    ("Coruscant", "Core Worlds", "Urban cityscape"),
    ("Naboo", "Mid Rim", "Temperate grasslands"),
    ("Hoth", "Outer Rim", "Frozen tundra"),
    ("Dagobah", "Outer Rim", "Murky swamp"),
    ("Endor", "Outer Rim", "Temperate forest"),
    ("Kamino", "Wild Space", "Stormy ocean"),
    ("Geonosis", "Outer Rim", "Rocky desert"),
    ("Mustafar", "Outer Rim", "Volcanic lava"),
    ("Alderaan", "Core Worlds", "Temperate plains"),
    ("Jakku", "Western Reaches", "Desert wasteland"),
    ("Mandalore", "Outer Rim", "Desert and forest"),
];

/// (franchise, title, release year, developer)
const GAMES: &[(&str, &str, i32, &str)] = &[
    ("Star Wars", "Knights of the Old Republic", 2003, "BioWare"),
    ("Star Wars", "Star Wars Battlefront II", 2005, "Pandemic Studios"),
    ("Star Wars", "Jedi: Fallen Order", 2019, "Respawn Entertainment"),
    ("Star Wars", "Jedi: Survivor", 2023, "Respawn Entertainment"),
    ("Star Wars", "Republic Commando", 2005, "LucasArts"),
    ("Star Wars Legends", "The Force Unleashed", 2008, "LucasArts"),
    ("Star Wars", "Star Wars Squadrons", 2020, "Motive Studios"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Rows inserted per path segment, in insertion order.
    Populated(Vec<(String, usize)>),
    AlreadyPopulated,
}

/// Insert the sample rows in one transaction unless the sentinel franchise already exists.
pub async fn seed(pool: &PgPool, model: &ResolvedModel) -> Result<SeedOutcome, AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(SEED_LOCK_KEY)
        .execute(&mut *tx)
        .await?;

    let franchise = entity(model, "franchise")?;
    let sentinel = [("name".to_string(), json!(SENTINEL_FRANCHISE))];
    let q = select_list(franchise, &sentinel, Some(1), None, &[]);
    if fetch_optional(&mut *tx, &q).await?.is_some() {
        tracing::info!(sentinel = SENTINEL_FRANCHISE, "already populated; skipping seed");
        return Ok(SeedOutcome::AlreadyPopulated);
    }

    let mut seeder = Seeder {
        conn: &mut *tx,
        model,
        counts: Vec::new(),
    };

    let franchise_ids = seeder
        .insert_keyed(
            "franchise",
            FRANCHISES.iter().map(|(name, description, start_year)| {
                (*name, json!({"name": name, "description": description, "start_year": start_year}))
            }),
        )
        .await?;

    seeder
        .insert_all(
            "films",
            FILMS.iter().map(|(f, rating, box_office)| -> Result<Value, AppError> {
                Ok(json!({"franchise_id": id_of(&franchise_ids, f)?, "rating": rating, "box_office": box_office}))
            }),
        )
        .await?;
    seeder
        .insert_all(
            "tvseries",
            TV_SERIES.iter().map(|(f, title, start, end, seasons)| -> Result<Value, AppError> {
                Ok(json!({
                    "franchise_id": id_of(&franchise_ids, f)?,
                    "title": title,
                    "start_year": start,
                    "end_year": end,
                    "num_seasons": seasons
                }))
            }),
        )
        .await?;
    seeder
        .insert_all(
            "books",
            BOOKS.iter().map(|(f, title, year, author)| -> Result<Value, AppError> {
                Ok(json!({
                    "franchise_id": id_of(&franchise_ids, f)?,
                    "title": title,
                    "publication_year": year,
                    "author": author
                }))
            }),
        )
        .await?;

    let species_ids = seeder
        .insert_keyed(
            "species",
            SPECIES
                .iter()
                .map(|(name, classification)| (*name, json!({"name": name, "classification": classification}))),
        )
        .await?;
    let affiliation_ids = seeder
        .insert_keyed(
            "affiliations",
            AFFILIATIONS
                .iter()
                .map(|(name, description)| (*name, json!({"name": name, "description": description}))),
        )
        .await?;
    let person_ids = seeder
        .insert_keyed(
            "people",
            PEOPLE.iter().map(|(name, birth_year, role_type)| {
                (*name, json!({"name": name, "birth_year": birth_year, "role_type": role_type}))
            }),
        )
        .await?;

    seeder
        .insert_all(
            "characters",
            CHARACTERS.iter().map(|(name, person, species, affiliation)| -> Result<Value, AppError> {
                Ok(json!({
                    "name": name,
                    "person_id": id_of(&person_ids, person)?,
                    "species_id": id_of(&species_ids, species)?,
                    "affiliation_id": id_of(&affiliation_ids, affiliation)?
                }))
            }),
        )
        .await?;
    seeder
        .insert_all(
            "planets",
            PLANETS
                .iter()
                .map(|(name, region, climate)| Ok(json!({"name": name, "region": region, "climate": climate}))),
        )
        .await?;
    seeder
        .insert_all(
            "games",
            GAMES.iter().map(|(f, title, year, developer)| -> Result<Value, AppError> {
                Ok(json!({
                    "franchise_id": id_of(&franchise_ids, f)?,
                    "title": title,
                    "release_year": year,
                    "developer": developer
                }))
            }),
        )
        .await?;

    let counts = seeder.counts;
    tx.commit().await?;
    tracing::info!(?counts, "database populated");
    Ok(SeedOutcome::Populated(counts))
}

struct Seeder<'a> {
    conn: &'a mut PgConnection,
    model: &'a ResolvedModel,
    counts: Vec<(String, usize)>,
}

impl Seeder<'_> {
    async fn insert_one(&mut self, entity: &ResolvedEntity, row: Value) -> Result<Value, AppError> {
        let body: HashMap<String, Value> = match row {
            Value::Object(m) => m.into_iter().collect(),
            _ => return Err(AppError::BadRequest("seed row must be an object".into())),
        };
        CrudService::create(&mut *self.conn, entity, &body).await
    }

    async fn insert_all<I>(&mut self, path: &str, rows: I) -> Result<(), AppError>
    where
        I: IntoIterator<Item = Result<Value, AppError>>,
    {
        let entity = entity(self.model, path)?;
        let mut n = 0;
        for row in rows {
            self.insert_one(entity, row?).await?;
            n += 1;
        }
        self.counts.push((path.to_string(), n));
        Ok(())
    }

    /// Insert rows and return their generated primary keys by name.
    async fn insert_keyed<'k, I>(&mut self, path: &str, rows: I) -> Result<HashMap<&'k str, i64>, AppError>
    where
        I: IntoIterator<Item = (&'k str, Value)>,
    {
        let entity = entity(self.model, path)?;
        let mut ids = HashMap::new();
        for (key, row) in rows {
            let stored = self.insert_one(entity, row).await?;
            let id = stored
                .get(&entity.pk_column)
                .and_then(Value::as_i64)
                .ok_or_else(|| AppError::BadRequest(format!("{} row returned without {}", path, entity.pk_column)))?;
            ids.insert(key, id);
        }
        self.counts.push((path.to_string(), ids.len()));
        Ok(ids)
    }
}

fn entity<'m>(model: &'m ResolvedModel, path: &str) -> Result<&'m ResolvedEntity, AppError> {
    model
        .entity_by_path(path)
        .ok_or_else(|| AppError::NotFound(format!("catalog has no '{}' entity", path)))
}

fn id_of(ids: &HashMap<&str, i64>, key: &str) -> Result<i64, AppError> {
    ids.get(key)
        .copied()
        .ok_or_else(|| AppError::NotFound(format!("seed reference '{}'", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn sentinel_is_a_seeded_franchise() {
        assert!(FRANCHISES.iter().any(|(name, _, _)| *name == SENTINEL_FRANCHISE));
    }

    #[test]
    fn every_reference_resolves() {
        let franchises: HashSet<&str> = FRANCHISES.iter().map(|f| f.0).collect();
        let species: HashSet<&str> = SPECIES.iter().map(|s| s.0).collect();
        let affiliations: HashSet<&str> = AFFILIATIONS.iter().map(|a| a.0).collect();
        let people: HashSet<&str> = PEOPLE.iter().map(|p| p.0).collect();
        assert!(FILMS.iter().all(|f| franchises.contains(f.0)));
        assert!(TV_SERIES.iter().all(|s| franchises.contains(s.0)));
        assert!(BOOKS.iter().all(|b| franchises.contains(b.0)));
        assert!(GAMES.iter().all(|g| franchises.contains(g.0)));
        for (_, person, sp, aff) in CHARACTERS {
            assert!(people.contains(person), "{person}");
            assert!(species.contains(sp), "{sp}");
            assert!(affiliations.contains(aff), "{aff}");
        }
    }

    #[test]
    fn character_name_species_pairs_are_unique() {
        let pairs: HashSet<(&str, &str)> = CHARACTERS.iter().map(|c| (c.0, c.2)).collect();
        assert_eq!(pairs.len(), CHARACTERS.len());
    }

    #[test]
    fn box_office_values_are_non_negative() {
        assert!(FILMS.iter().all(|f| f.2 >= 0));
    }
}
