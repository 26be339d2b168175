use anyhow::anyhow;
use bb8_postgres::bb8::{Pool, PooledConnection};
use bb8_postgres::PostgresConnectionManager;
use bb8_postgres::tokio_postgres::error::SqlState;
use bb8_postgres::tokio_postgres::{IsolationLevel, NoTls, Row};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::error::{AppError, AppResult};
use crate::helpers::availability::is_available;
use crate::helpers::search::contains_pattern;
use crate::helpers::space_numbers::next_space_numbers;
use crate::models::parking_lot::ParkingLot;
use crate::models::parking_space::ParkingSpace;
use crate::models::reservation::{NewReservation, Reservation, TimeWindow};
use crate::models::user::{User, UserCredentials};

pub const RETRY_LIMIT: usize = 5;

const SCHEMA: &str = include_str!("schema.sql");

pub struct PostgresConnectionRepo {
    postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresConnectionRepo {
    pub fn new(
        postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
    ) -> Self {
        Self {
            postgres_connection
        }
    }

    async fn get_postgres_connection(
        &self,
    ) -> AppResult<PooledConnection<PostgresConnectionManager<NoTls>>> {
        for _ in 0..RETRY_LIMIT {
            match self.postgres_connection.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!("Failed to retrieve postgres connection due to: {}, retrying in 3s", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                    continue;
                }
            }
        }

        Err(AppError::Unknown(anyhow!("Failed to retrieve a valid connection from postgres pool, BAILING")))
    }

    pub async fn ensure_schema(&self) -> AppResult<()> {
        let conn = self.get_postgres_connection().await?;
        conn.batch_execute(SCHEMA).await?;
        Ok(())
    }

    pub async fn add_user(
        &self,
        user: &User,
        password_hash: &str,
    ) -> AppResult<()> {
        let conn = self.get_postgres_connection().await?;
        conn
            .execute(
                "INSERT INTO users \
                (id, admin, email, first_name, last_name, residence_country, password_hash) \
                VALUES ($1, $2, $3, $4, $5, $6, $7);",
                &[
                    &user.id,
                    &user.admin,
                    &user.email,
                    &user.first_name,
                    &user.last_name,
                    &user.residence_country,
                    &password_hash,
                ],
            )
            .await
            .map_err(AppError::from_user_insert)?;

        Ok(())
    }

    pub async fn retrieve_user_credentials(
        &self,
        email: &str,
    ) -> AppResult<Option<UserCredentials>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt("SELECT * FROM users WHERE lower(email) = lower($1);", &[&email])
            .await?;

        match row {
            Some(row) => Ok(Some(UserCredentials {
                user: parse_row_into_user(&row)?,
                password_hash: row.try_get("password_hash")?,
            })),
            None => Ok(None),
        }
    }

    pub async fn create_session(
        &self,
        user_id: &str,
    ) -> AppResult<String> {
        let conn = self.get_postgres_connection().await?;
        let token = Uuid::new_v4().simple().to_string();
        conn
            .execute(
                "INSERT INTO sessions (token, user_id, created_at) VALUES ($1, $2, $3);",
                &[&token, &user_id, &OffsetDateTime::now_utc()],
            )
            .await?;

        debug!("Opened session for user: {}", user_id);
        Ok(token)
    }

    pub async fn retrieve_session_user(
        &self,
        token: &str,
    ) -> AppResult<Option<User>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt(
                "SELECT users.* FROM sessions \
                JOIN users ON users.id = sessions.user_id \
                WHERE sessions.token = $1;",
                &[&token],
            )
            .await?;

        row.as_ref().map(parse_row_into_user).transpose()
    }

    pub async fn remove_session(
        &self,
        token: &str,
    ) -> AppResult<()> {
        let conn = self.get_postgres_connection().await?;
        conn
            .execute("DELETE FROM sessions WHERE token = $1;", &[&token])
            .await?;
        Ok(())
    }

    pub async fn add_parking_lot(
        &self,
        parking_lot: &ParkingLot,
    ) -> AppResult<()> {
        let conn = self.get_postgres_connection().await?;
        conn
            .execute(
                "INSERT INTO parking_lots (id, name, country, city, latitude, longitude) \
                VALUES ($1, $2, $3, $4, $5, $6);",
                &[
                    &parking_lot.id,
                    &parking_lot.name,
                    &parking_lot.country,
                    &parking_lot.city,
                    &parking_lot.latitude,
                    &parking_lot.longitude,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn retrieve_all_parking_lots(
        &self,
    ) -> AppResult<Vec<ParkingLot>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT * FROM parking_lots ORDER BY name;", &[])
            .await?;

        rows.iter().map(parse_row_into_parking_lot).collect()
    }

    pub async fn retrieve_parking_lot(
        &self,
        parking_lot_id: &str,
    ) -> AppResult<Option<ParkingLot>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt("SELECT * FROM parking_lots WHERE id = $1;", &[&parking_lot_id])
            .await?;

        row.as_ref().map(parse_row_into_parking_lot).transpose()
    }

    pub async fn search_parking_lots_by_name(
        &self,
        name: &str,
    ) -> AppResult<Vec<ParkingLot>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM parking_lots WHERE name ILIKE $1 ORDER BY name;",
                &[&contains_pattern(name)],
            )
            .await?;

        rows.iter().map(parse_row_into_parking_lot).collect()
    }

    pub async fn search_parking_lots_by_city(
        &self,
        city: &str,
    ) -> AppResult<Vec<ParkingLot>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM parking_lots WHERE city ILIKE $1 ORDER BY name;",
                &[&contains_pattern(city)],
            )
            .await?;

        rows.iter().map(parse_row_into_parking_lot).collect()
    }

    /// Appends `count` spaces to a lot, numbered after the spaces it already has.
    pub async fn add_parking_spaces(
        &self,
        parking_lot_id: &str,
        count: u32,
    ) -> AppResult<Vec<ParkingSpace>> {
        let mut conn = self.get_postgres_connection().await?;
        let tx = conn.transaction().await?;

        // Row lock on the lot serializes concurrent additions to it.
        let lot = tx
            .query_opt("SELECT id FROM parking_lots WHERE id = $1 FOR UPDATE;", &[&parking_lot_id])
            .await?;
        if lot.is_none() {
            return Err(AppError::NotFound(format!("Parking lot {}", parking_lot_id)));
        }

        let existing: i64 = tx
            .query_one(
                "SELECT COUNT(*) FROM parking_spaces WHERE parking_lot_id = $1;",
                &[&parking_lot_id],
            )
            .await?
            .try_get::<usize, i64>(0)?;
        let existing = usize::try_from(existing)
            .map_err(|e| AppError::Unknown(anyhow!("Negative parking space count: {}", e)))?;

        let parking_spaces: Vec<ParkingSpace> = next_space_numbers(existing, count)?
            .map(|number| ParkingSpace {
                id: Uuid::new_v4().to_string(),
                parking_lot_id: parking_lot_id.to_string(),
                number,
            })
            .collect();
        let ids: Vec<&str> = parking_spaces.iter().map(|space| space.id.as_str()).collect();
        let numbers: Vec<i32> = parking_spaces.iter().map(|space| space.number).collect();

        tx
            .execute(
                "INSERT INTO parking_spaces (id, parking_lot_id, number) \
                SELECT new_space.id, $2::text, new_space.number \
                FROM UNNEST($1::text[], $3::int4[]) AS new_space (id, number);",
                &[&ids, &parking_lot_id, &numbers],
            )
            .await?;

        tx.commit().await?;
        Ok(parking_spaces)
    }

    pub async fn retrieve_all_parking_spaces(
        &self,
    ) -> AppResult<Vec<ParkingSpace>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT * FROM parking_spaces ORDER BY parking_lot_id, number;", &[])
            .await?;

        rows.iter().map(parse_row_into_parking_space).collect()
    }

    pub async fn retrieve_parking_spaces_by_lot(
        &self,
        parking_lot_id: &str,
    ) -> AppResult<Vec<ParkingSpace>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM parking_spaces WHERE parking_lot_id = $1 ORDER BY number;",
                &[&parking_lot_id],
            )
            .await?;

        rows.iter().map(parse_row_into_parking_space).collect()
    }

    pub async fn retrieve_parking_space(
        &self,
        parking_space_id: &str,
    ) -> AppResult<Option<ParkingSpace>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt("SELECT * FROM parking_spaces WHERE id = $1;", &[&parking_space_id])
            .await?;

        row.as_ref().map(parse_row_into_parking_space).transpose()
    }

    pub async fn retrieve_user_reservations(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM reservations WHERE user_id = $1 ORDER BY start_timestamp;",
                &[&user_id],
            )
            .await?;

        rows.iter().map(parse_row_into_reservation).collect()
    }

    pub async fn retrieve_parking_lot_reservations(
        &self,
        parking_lot_id: &str,
    ) -> AppResult<Vec<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM reservations WHERE parking_lot_id = $1 ORDER BY start_timestamp;",
                &[&parking_lot_id],
            )
            .await?;

        rows.iter().map(parse_row_into_reservation).collect()
    }

    pub async fn retrieve_parking_space_reservations(
        &self,
        parking_space_id: &str,
    ) -> AppResult<Vec<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query(
                "SELECT * FROM reservations WHERE parking_space_id = $1 ORDER BY start_timestamp;",
                &[&parking_space_id],
            )
            .await?;

        rows.iter().map(parse_row_into_reservation).collect()
    }

    pub async fn check_availability(
        &self,
        parking_space_id: &str,
        window: &TimeWindow,
    ) -> AppResult<bool> {
        let reservations = self
            .retrieve_parking_space_reservations(parking_space_id)
            .await?;

        Ok(is_available(&reservations, window))
    }

    /// Checks the window against the space's reservations and inserts the new one in a single
    /// serializable transaction, so overlapping concurrent attempts cannot both commit.
    pub async fn add_reservation(
        &self,
        new_reservation: NewReservation,
    ) -> AppResult<Reservation> {
        let space_id = new_reservation.parking_space_id.clone();
        let mut conn = self.get_postgres_connection().await?;
        let tx = conn
            .build_transaction()
            .isolation_level(IsolationLevel::Serializable)
            .start()
            .await?;

        let space = tx
            .query_opt(
                "SELECT * FROM parking_spaces WHERE id = $1;",
                &[&new_reservation.parking_space_id],
            )
            .await
            .map_err(|e| map_serialization_failure(e, &space_id))?
            .as_ref()
            .map(parse_row_into_parking_space)
            .transpose()?
            .ok_or_else(|| AppError::NotFound(format!("Parking space {}", space_id)))?;

        if space.parking_lot_id != new_reservation.parking_lot_id {
            return Err(AppError::Validation(format!(
                "Parking space {} does not belong to parking lot {}",
                space.id, new_reservation.parking_lot_id
            )));
        }

        let existing = tx
            .query(
                "SELECT * FROM reservations WHERE parking_space_id = $1;",
                &[&new_reservation.parking_space_id],
            )
            .await
            .map_err(|e| map_serialization_failure(e, &space_id))?
            .iter()
            .map(parse_row_into_reservation)
            .collect::<AppResult<Vec<Reservation>>>()?;

        if !is_available(&existing, &new_reservation.window) {
            return Err(AppError::SpaceUnavailable(space_id));
        }

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            user_id: new_reservation.user_id,
            parking_lot_id: new_reservation.parking_lot_id,
            parking_space_id: new_reservation.parking_space_id,
            timestamp: OffsetDateTime::now_utc(),
            start_timestamp: new_reservation.window.start,
            end_timestamp: new_reservation.window.end,
        };

        tx
            .execute(
                "INSERT INTO reservations \
                (id, user_id, parking_lot_id, parking_space_id, timestamp, start_timestamp, end_timestamp) \
                VALUES ($1, $2, $3, $4, $5, $6, $7);",
                &[
                    &reservation.id,
                    &reservation.user_id,
                    &reservation.parking_lot_id,
                    &reservation.parking_space_id,
                    &reservation.timestamp,
                    &reservation.start_timestamp,
                    &reservation.end_timestamp,
                ],
            )
            .await
            .map_err(|e| map_serialization_failure(e, &space_id))?;

        tx.commit()
            .await
            .map_err(|e| map_serialization_failure(e, &space_id))?;

        Ok(reservation)
    }

    pub async fn retrieve_reservation(
        &self,
        reservation_id: &str,
    ) -> AppResult<Option<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt("SELECT * FROM reservations WHERE id = $1;", &[&reservation_id])
            .await?;

        row.as_ref().map(parse_row_into_reservation).transpose()
    }

    pub async fn remove_reservation(
        &self,
        reservation_id: &str,
    ) -> AppResult<()> {
        let conn = self.get_postgres_connection().await?;
        let removed = conn
            .execute("DELETE FROM reservations WHERE id = $1;", &[&reservation_id])
            .await?;

        if removed == 0 {
            return Err(AppError::NotFound(format!("Reservation {}", reservation_id)));
        }
        Ok(())
    }
}

/// A concurrent booking of the same space won the race.
fn map_serialization_failure(
    err: bb8_postgres::tokio_postgres::Error,
    parking_space_id: &str,
) -> AppError {
    if is_serialization_failure(err.code()) {
        AppError::SpaceUnavailable(parking_space_id.to_string())
    } else {
        AppError::Database(err)
    }
}

fn is_serialization_failure(code: Option<&SqlState>) -> bool {
    code == Some(&SqlState::T_R_SERIALIZATION_FAILURE)
}

fn parse_row_into_user(
    row: &Row,
) -> AppResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        admin: row.try_get("admin")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        residence_country: row.try_get("residence_country")?,
    })
}

fn parse_row_into_parking_lot(
    row: &Row,
) -> AppResult<ParkingLot> {
    Ok(ParkingLot {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        city: row.try_get("city")?,
        latitude: row.try_get::<&str, f64>("latitude")?,
        longitude: row.try_get::<&str, f64>("longitude")?,
    })
}

fn parse_row_into_parking_space(
    row: &Row,
) -> AppResult<ParkingSpace> {
    Ok(ParkingSpace {
        id: row.try_get("id")?,
        parking_lot_id: row.try_get("parking_lot_id")?,
        number: row.try_get::<&str, i32>("number")?,
    })
}

fn parse_row_into_reservation(
    row: &Row,
) -> AppResult<Reservation> {
    Ok(Reservation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        parking_lot_id: row.try_get("parking_lot_id")?,
        parking_space_id: row.try_get("parking_space_id")?,
        timestamp: row.try_get::<&str, OffsetDateTime>("timestamp")?,
        start_timestamp: row.try_get::<&str, OffsetDateTime>("start_timestamp")?,
        end_timestamp: row.try_get::<&str, OffsetDateTime>("end_timestamp")?,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use time::macros::datetime;
    use super::*;

    #[test]
    fn only_serialization_failures_become_conflicts() {
        assert!(is_serialization_failure(Some(&SqlState::T_R_SERIALIZATION_FAILURE)));
        assert!(!is_serialization_failure(Some(&SqlState::T_R_DEADLOCK_DETECTED)));
        assert!(!is_serialization_failure(Some(&SqlState::UNIQUE_VIOLATION)));
        assert!(!is_serialization_failure(None));
    }

    #[test]
    fn emails_are_unique_regardless_of_case() {
        assert!(SCHEMA.contains("ON users (lower(email))"));
    }

    /// Repository over the database named by `TEST_DATABASE_URL`, or `None` when it is unset.
    async fn test_repo() -> Option<Arc<PostgresConnectionRepo>> {
        let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
        let manager = PostgresConnectionManager::new_from_stringlike(database_url, NoTls).unwrap();
        let pool = Pool::builder().max_size(16).build(manager).await.unwrap();
        let repo = PostgresConnectionRepo::new(pool);
        repo.ensure_schema().await.unwrap();
        Some(Arc::new(repo))
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            admin: false,
            email: email.into(),
            first_name: "Ana".into(),
            last_name: "Gomez".into(),
            residence_country: "Colombia".into(),
        }
    }

    async fn lot_with_spaces(repo: &PostgresConnectionRepo, count: u32) -> (ParkingLot, Vec<ParkingSpace>) {
        let parking_lot = ParkingLot {
            id: Uuid::new_v4().to_string(),
            name: "Centro".into(),
            country: "Colombia".into(),
            city: "Medellin".into(),
            latitude: 6.2442,
            longitude: -75.5812,
        };
        repo.add_parking_lot(&parking_lot).await.unwrap();
        let parking_spaces = repo.add_parking_spaces(&parking_lot.id, count).await.unwrap();
        (parking_lot, parking_spaces)
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn second_registration_with_other_case_collides() {
        let Some(repo) = test_repo().await else { return };
        let local = Uuid::new_v4().simple().to_string();

        repo.add_user(&user(&format!("{}@parkeasy.dev", local)), "hash").await.unwrap();
        let duplicate = repo
            .add_user(&user(&format!("{}@ParkEasy.DEV", local.to_uppercase())), "hash")
            .await;
        assert!(matches!(duplicate, Err(AppError::UserCollision)));

        let credentials = repo
            .retrieve_user_credentials(&format!("{}@PARKEASY.dev", local))
            .await
            .unwrap();
        assert!(credentials.is_some());
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn spaces_are_numbered_after_the_existing_ones() {
        let Some(repo) = test_repo().await else { return };
        let (parking_lot, first) = lot_with_spaces(&repo, 3).await;
        let second = repo.add_parking_spaces(&parking_lot.id, 2).await.unwrap();

        assert_eq!(first.iter().map(|space| space.number).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(second.iter().map(|space| space.number).collect::<Vec<_>>(), vec![4, 5]);

        let stored = repo.retrieve_parking_spaces_by_lot(&parking_lot.id).await.unwrap();
        assert_eq!(stored.iter().map(|space| space.number).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);

        let missing_lot = repo.add_parking_spaces("no-such-lot", 1).await;
        assert!(matches!(missing_lot, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn concurrent_overlapping_bookings_store_one_reservation() {
        let Some(repo) = test_repo().await else { return };
        let (parking_lot, parking_spaces) = lot_with_spaces(&repo, 1).await;
        let parking_space = parking_spaces[0].clone();

        let attempts = (0..16).map(|minute| {
            let repo = repo.clone();
            let new_reservation = NewReservation {
                user_id: format!("user-{}", minute),
                parking_lot_id: parking_lot.id.clone(),
                parking_space_id: parking_space.id.clone(),
                window: TimeWindow {
                    start: datetime!(2030-03-10 10:00 UTC) + time::Duration::minutes(minute),
                    end: datetime!(2030-03-10 12:00 UTC),
                },
            };
            tokio::spawn(async move { repo.add_reservation(new_reservation).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut stored = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => stored += 1,
                Err(AppError::SpaceUnavailable(id)) => assert_eq!(id, parking_space.id),
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(stored, 1);
        assert_eq!(
            repo.retrieve_parking_space_reservations(&parking_space.id).await.unwrap().len(),
            1
        );

        let touching = repo
            .add_reservation(NewReservation {
                user_id: "user-late".into(),
                parking_lot_id: parking_lot.id.clone(),
                parking_space_id: parking_space.id.clone(),
                window: TimeWindow {
                    start: datetime!(2030-03-10 12:00 UTC),
                    end: datetime!(2030-03-10 13:00 UTC),
                },
            })
            .await;
        assert!(touching.is_ok());
    }
}
