//! Lobby repository for database operations
//!
//! Every mutation runs in a single transaction that first locks the lobby
//! row with `SELECT ... FOR UPDATE`, so concurrent joins and leaves on the
//! same lobby are serialized by PostgreSQL and `current_players` is only
//! ever changed with in-place arithmetic. Dropping a transaction without
//! committing rolls it back.

use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::error::LobbyError;
use crate::models::{Game, LeavePlan, Lobby, Player};

/// Result of a successful leave
#[derive(Debug, Clone, PartialEq)]
pub enum LeaveOutcome {
    /// The lobby is still there; `new_creator` is set when ownership moved
    Left {
        lobby: Lobby,
        new_creator: Option<i64>,
    },
    /// The leaving player was the last one and the lobby was deleted
    Closed,
}

/// Lobby repository
#[derive(Clone)]
pub struct LobbyRepository {
    pool: PgPool,
}

impl LobbyRepository {
    /// Create a new lobby repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a lobby with its creator as the only member
    pub async fn create_lobby(
        &self,
        creator_id: i64,
        name: &str,
        max_players: i32,
    ) -> Result<Lobby, LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = sqlx::query_as::<_, Lobby>(
            r#"
            INSERT INTO lobbies (name, creator_id, max_players, current_players)
            VALUES ($1, $2, $3, 1)
            RETURNING id, name, creator_id, max_players, current_players,
                      is_active, is_game_started, created_at
            "#,
        )
        .bind(name)
        .bind(creator_id)
        .bind(max_players)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO players (user_id, lobby_id) VALUES ($1, $2)")
            .bind(creator_id)
            .bind(lobby.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!("User {} created lobby {} ({})", creator_id, lobby.id, lobby.name);
        Ok(lobby)
    }

    /// Get active lobbies whose game has not started, oldest first
    pub async fn list_open_lobbies(&self) -> Result<Vec<Lobby>, LobbyError> {
        let lobbies = sqlx::query_as::<_, Lobby>(
            r#"
            SELECT id, name, creator_id, max_players, current_players,
                   is_active, is_game_started, created_at
            FROM lobbies
            WHERE is_active AND NOT is_game_started
            ORDER BY created_at, id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(lobbies)
    }

    /// Get a lobby by ID
    pub async fn get_lobby(&self, lobby_id: i64) -> Result<Lobby, LobbyError> {
        sqlx::query_as::<_, Lobby>(
            r#"
            SELECT id, name, creator_id, max_players, current_players,
                   is_active, is_game_started, created_at
            FROM lobbies
            WHERE id = $1
            "#,
        )
        .bind(lobby_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LobbyError::NotFound)
    }

    /// Get a lobby together with its members in join order
    ///
    /// The lobby row is held with `FOR SHARE` while the members are read, so
    /// a join or leave cannot commit between the two reads.
    pub async fn get_lobby_detail(&self, lobby_id: i64) -> Result<(Lobby, Vec<Player>), LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = sqlx::query_as::<_, Lobby>(
            r#"
            SELECT id, name, creator_id, max_players, current_players,
                   is_active, is_game_started, created_at
            FROM lobbies
            WHERE id = $1
            FOR SHARE
            "#,
        )
        .bind(lobby_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LobbyError::NotFound)?;
        let members = fetch_members(&mut *tx, lobby_id).await?;

        tx.commit().await?;

        Ok((lobby, members))
    }

    /// Check whether a user holds a membership in a lobby
    pub async fn is_member(&self, lobby_id: i64, user_id: i64) -> Result<bool, LobbyError> {
        let exists = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM players WHERE lobby_id = $1 AND user_id = $2)",
        )
        .bind(lobby_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Add a user to a lobby
    ///
    /// Fails with, in order of precedence, `NotFound`, `LobbyFull`,
    /// `GameAlreadyStarted` or `AlreadyJoined`.
    pub async fn join_lobby(&self, lobby_id: i64, user_id: i64) -> Result<Lobby, LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = lock_lobby(&mut *tx, lobby_id)
            .await?
            .ok_or(LobbyError::NotFound)?;

        let already_joined: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM players WHERE lobby_id = $1 AND user_id = $2)",
        )
        .bind(lobby_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        lobby.check_join(already_joined)?;

        sqlx::query("INSERT INTO players (user_id, lobby_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(lobby_id)
            .execute(&mut *tx)
            .await?;

        let lobby = sqlx::query_as::<_, Lobby>(
            r#"
            UPDATE lobbies
            SET current_players = current_players + 1
            WHERE id = $1
            RETURNING id, name, creator_id, max_players, current_players,
                      is_active, is_game_started, created_at
            "#,
        )
        .bind(lobby_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "User {} joined lobby {} ({}/{})",
            user_id, lobby_id, lobby.current_players, lobby.max_players
        );
        Ok(lobby)
    }

    /// Remove a user from a lobby
    ///
    /// Deletes the lobby when the last player leaves; hands it to the
    /// earliest remaining member when the creator leaves.
    pub async fn leave_lobby(&self, lobby_id: i64, user_id: i64) -> Result<LeaveOutcome, LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = lock_lobby(&mut *tx, lobby_id)
            .await?
            .ok_or(LobbyError::NotInLobby)?;
        let members = fetch_members(&mut *tx, lobby_id).await?;

        let outcome = match lobby.plan_leave(user_id, &members)? {
            LeavePlan::CloseLobby => {
                // players and games go with the lobby
                sqlx::query("DELETE FROM lobbies WHERE id = $1")
                    .bind(lobby_id)
                    .execute(&mut *tx)
                    .await?;

                LeaveOutcome::Closed
            }
            LeavePlan::Stay { new_creator } => {
                sqlx::query("DELETE FROM players WHERE lobby_id = $1 AND user_id = $2")
                    .bind(lobby_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;

                let lobby = sqlx::query_as::<_, Lobby>(
                    r#"
                    UPDATE lobbies
                    SET current_players = current_players - 1,
                        creator_id = COALESCE($2, creator_id)
                    WHERE id = $1
                    RETURNING id, name, creator_id, max_players, current_players,
                              is_active, is_game_started, created_at
                    "#,
                )
                .bind(lobby_id)
                .bind(new_creator)
                .fetch_one(&mut *tx)
                .await?;

                LeaveOutcome::Left { lobby, new_creator }
            }
        };

        tx.commit().await?;

        match &outcome {
            LeaveOutcome::Closed => info!("User {} left lobby {}, lobby closed", user_id, lobby_id),
            LeaveOutcome::Left {
                new_creator: Some(creator),
                ..
            } => info!(
                "User {} left lobby {}, ownership passed to user {}",
                user_id, lobby_id, creator
            ),
            LeaveOutcome::Left { .. } => info!("User {} left lobby {}", user_id, lobby_id),
        }

        Ok(outcome)
    }

    /// Set the ready flag of a member
    pub async fn set_ready(
        &self,
        lobby_id: i64,
        user_id: i64,
        is_ready: bool,
    ) -> Result<Player, LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = lock_lobby(&mut *tx, lobby_id)
            .await?
            .ok_or(LobbyError::NotFound)?;

        if lobby.is_game_started {
            return Err(LobbyError::GameAlreadyStarted);
        }

        let player = sqlx::query_as::<_, Player>(
            r#"
            UPDATE players
            SET is_ready = $3
            WHERE lobby_id = $1 AND user_id = $2
            RETURNING id, user_id, lobby_id, is_ready, joined_at
            "#,
        )
        .bind(lobby_id)
        .bind(user_id)
        .bind(is_ready)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LobbyError::NotInLobby)?;

        tx.commit().await?;

        Ok(player)
    }

    /// Start the game of a lobby
    ///
    /// Returns the new game and the caller's 1-based position in join order.
    pub async fn start_game(&self, lobby_id: i64, user_id: i64) -> Result<(Game, usize), LobbyError> {
        let mut tx = self.pool.begin().await?;

        let lobby = lock_lobby(&mut *tx, lobby_id)
            .await?
            .ok_or(LobbyError::NotFound)?;
        let members = fetch_members(&mut *tx, lobby_id).await?;

        let player_number = lobby.check_start(user_id, &members)?;

        sqlx::query("UPDATE lobbies SET is_game_started = TRUE WHERE id = $1")
            .bind(lobby_id)
            .execute(&mut *tx)
            .await?;

        let game = sqlx::query_as::<_, Game>(
            r#"
            INSERT INTO games (lobby_id, current_turn)
            VALUES ($1, 0)
            RETURNING id, lobby_id, current_turn, is_finished, winner_id, created_at
            "#,
        )
        .bind(lobby_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Lobby {} started game {}", lobby_id, game.id);
        Ok((game, player_number))
    }
}

async fn lock_lobby(conn: &mut PgConnection, lobby_id: i64) -> Result<Option<Lobby>, sqlx::Error> {
    sqlx::query_as::<_, Lobby>(
        r#"
        SELECT id, name, creator_id, max_players, current_players,
               is_active, is_game_started, created_at
        FROM lobbies
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(lobby_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn fetch_members(conn: &mut PgConnection, lobby_id: i64) -> Result<Vec<Player>, sqlx::Error> {
    sqlx::query_as::<_, Player>(
        r#"
        SELECT id, user_id, lobby_id, is_ready, joined_at
        FROM players
        WHERE lobby_id = $1
        ORDER BY joined_at, id
        "#,
    )
    .bind(lobby_id)
    .fetch_all(&mut *conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn user(pool: &PgPool, name: &str) -> sqlx::Result<i64> {
        sqlx::query_scalar(
            "INSERT INTO users (username, email, hashed_password) VALUES ($1, $2, 'x') RETURNING id",
        )
        .bind(name)
        .bind(format!("{}@fleet.sea", name))
        .fetch_one(pool)
        .await
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_two_player_lobby_lifecycle(pool: PgPool) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let a = user(&pool, "alice").await?;
        let b = user(&pool, "bob").await?;
        let c = user(&pool, "carol").await?;

        let lobby = repo.create_lobby(a, "Midway", 2).await?;
        assert_eq!(lobby.current_players, 1);
        assert_eq!(lobby.creator_id, a);
        let (detail, players) = repo.get_lobby_detail(lobby.id).await?;
        assert_eq!(detail, lobby);
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].user_id, a);

        let lobby = repo.join_lobby(lobby.id, b).await?;
        assert_eq!(lobby.current_players, 2);

        assert!(matches!(
            repo.join_lobby(lobby.id, c).await,
            Err(LobbyError::LobbyFull)
        ));

        match repo.leave_lobby(lobby.id, b).await? {
            LeaveOutcome::Left { lobby, new_creator } => {
                assert_eq!(lobby.current_players, 1);
                assert_eq!(lobby.creator_id, a);
                assert_eq!(new_creator, None);
            }
            LeaveOutcome::Closed => panic!("lobby should still exist"),
        }

        assert_eq!(repo.leave_lobby(lobby.id, a).await?, LeaveOutcome::Closed);
        assert!(matches!(
            repo.get_lobby(lobby.id).await,
            Err(LobbyError::NotFound)
        ));

        let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM players WHERE lobby_id = $1")
            .bind(lobby.id)
            .fetch_one(&pool)
            .await?;
        assert_eq!(orphans, 0);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_duplicate_join_and_foreign_leave(pool: PgPool) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let a = user(&pool, "alice").await?;
        let b = user(&pool, "bob").await?;

        let lobby = repo.create_lobby(a, "Jutland", 4).await?;
        assert!(matches!(
            repo.join_lobby(lobby.id, a).await,
            Err(LobbyError::AlreadyJoined)
        ));
        assert!(matches!(
            repo.leave_lobby(lobby.id, b).await,
            Err(LobbyError::NotInLobby)
        ));
        assert!(matches!(
            repo.join_lobby(lobby.id + 1000, b).await,
            Err(LobbyError::NotFound)
        ));
        assert_eq!(repo.get_lobby(lobby.id).await?.current_players, 1);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_creator_leaving_passes_ownership_to_earliest_member(
        pool: PgPool,
    ) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let a = user(&pool, "alice").await?;
        let b = user(&pool, "bob").await?;
        let c = user(&pool, "carol").await?;

        let lobby = repo.create_lobby(a, "Coral Sea", 3).await?;
        repo.join_lobby(lobby.id, b).await?;
        repo.join_lobby(lobby.id, c).await?;

        match repo.leave_lobby(lobby.id, a).await? {
            LeaveOutcome::Left { lobby, new_creator } => {
                assert_eq!(new_creator, Some(b));
                assert_eq!(lobby.creator_id, b);
                assert_eq!(lobby.current_players, 2);
            }
            LeaveOutcome::Closed => panic!("lobby should still exist"),
        }

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_started_lobby_rejects_joins_and_leaves_open_list(
        pool: PgPool,
    ) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let a = user(&pool, "alice").await?;
        let b = user(&pool, "bob").await?;
        let c = user(&pool, "carol").await?;

        let lobby = repo.create_lobby(a, "Leyte Gulf", 4).await?;
        repo.join_lobby(lobby.id, b).await?;

        assert!(matches!(
            repo.start_game(lobby.id, a).await,
            Err(LobbyError::PlayersNotReady)
        ));
        assert!(repo.set_ready(lobby.id, b, true).await?.is_ready);
        assert!(matches!(
            repo.start_game(lobby.id, b).await,
            Err(LobbyError::NotCreator)
        ));

        let (game, player_number) = repo.start_game(lobby.id, a).await?;
        assert_eq!(game.lobby_id, lobby.id);
        assert_eq!(game.current_turn, 0);
        assert_eq!(player_number, 1);

        assert!(matches!(
            repo.join_lobby(lobby.id, c).await,
            Err(LobbyError::GameAlreadyStarted)
        ));
        assert!(repo.list_open_lobbies().await?.is_empty());

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_concurrent_joins_never_overfill(pool: PgPool) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let owner = user(&pool, "owner").await?;
        let lobby = repo.create_lobby(owner, "Scapa Flow", 3).await?;

        let mut handles = Vec::new();
        for i in 0..6 {
            let id = user(&pool, &format!("sailor{}", i)).await?;
            let repo = repo.clone();
            handles.push(tokio::spawn(
                async move { repo.join_lobby(lobby.id, id).await },
            ));
        }

        let mut joined = 0;
        for handle in handles {
            match handle.await? {
                Ok(_) => joined += 1,
                Err(LobbyError::LobbyFull) => {}
                Err(e) => return Err(e.into()),
            }
        }

        assert_eq!(joined, 2);
        assert_eq!(repo.get_lobby(lobby.id).await?.current_players, 3);
        assert_eq!(repo.get_lobby_detail(lobby.id).await?.1.len(), 3);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_ready_toggle_is_refused_once_started(pool: PgPool) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let a = user(&pool, "alice").await?;
        let b = user(&pool, "bob").await?;
        let c = user(&pool, "carol").await?;

        let lobby = repo.create_lobby(a, "Denmark Strait", 3).await?;
        repo.join_lobby(lobby.id, b).await?;

        assert!(matches!(
            repo.set_ready(lobby.id, c, true).await,
            Err(LobbyError::NotInLobby)
        ));
        assert!(matches!(
            repo.set_ready(lobby.id + 1000, b, true).await,
            Err(LobbyError::NotFound)
        ));

        repo.set_ready(lobby.id, b, true).await?;
        repo.start_game(lobby.id, a).await?;

        assert!(matches!(
            repo.set_ready(lobby.id, b, false).await,
            Err(LobbyError::GameAlreadyStarted)
        ));
        let (_, players) = repo.get_lobby_detail(lobby.id).await?;
        assert!(players.iter().any(|p| p.user_id == b && p.is_ready));

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_detail_count_matches_members_during_joins(pool: PgPool) -> anyhow::Result<()> {
        let repo = LobbyRepository::new(pool.clone());
        let owner = user(&pool, "owner").await?;
        let lobby = repo.create_lobby(owner, "Skagerrak", 8).await?;

        let mut joins = Vec::new();
        for i in 0..7 {
            let id = user(&pool, &format!("sailor{}", i)).await?;
            let repo = repo.clone();
            joins.push(tokio::spawn(
                async move { repo.join_lobby(lobby.id, id).await },
            ));
        }

        let mut reads = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            reads.push(tokio::spawn(
                async move { repo.get_lobby_detail(lobby.id).await },
            ));
        }

        for handle in joins {
            handle.await??;
        }
        for handle in reads {
            let (detail, players) = handle.await??;
            assert_eq!(detail.current_players as usize, players.len());
        }

        let (detail, players) = repo.get_lobby_detail(lobby.id).await?;
        assert_eq!(detail.current_players, 8);
        assert_eq!(players.len(), 8);

        Ok(())
    }
}
