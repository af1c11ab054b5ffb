//! Connections between users that let them see each other's finances.
//!
//! One user sends a request to another by username, and the receiver
//! accepts or rejects it. Once accepted, either user can view the other's
//! activity and accounts. A pair of users has at most one connection,
//! whichever direction it was sent in.

use rusqlite::{
    Connection, OptionalExtension, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::Serialize;

use crate::{
    DatabaseId, Error, UserID,
    account::{Account, get_accounts_by_user},
    activity::{ActivityEntry, get_activity},
    user::{User, get_user_by_id, get_user_by_username},
};

/// Database identifier for a connection between two users.
pub type UserConnectionId = DatabaseId;

/// Where a connection request is up to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Waiting for the receiver to respond.
    Pending,
    /// The users can see each other's finances.
    Accepted,
    /// The receiver turned the request down.
    Rejected,
}

impl ConnectionStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Pending => "pending",
            ConnectionStatus::Accepted => "accepted",
            ConnectionStatus::Rejected => "rejected",
        }
    }
}

impl ToSql for ConnectionStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ConnectionStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "pending" => Ok(ConnectionStatus::Pending),
            "accepted" => Ok(ConnectionStatus::Accepted),
            "rejected" => Ok(ConnectionStatus::Rejected),
            other => Err(FromSqlError::Other(
                format!("invalid connection status {other:?}").into(),
            )),
        }
    }
}

/// A connection request from one user to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserConnection {
    /// The ID of the connection.
    pub id: UserConnectionId,
    /// The user that sent the request.
    pub sender_id: UserID,
    /// The user the request was sent to.
    pub receiver_id: UserID,
    /// Where the request is up to.
    pub status: ConnectionStatus,
}

/// The result of sending a connection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// A new request was created.
    Sent(UserConnection),
    /// The users are already connected.
    AlreadyConnected,
    /// A request between the users is waiting for a response.
    AlreadyPending,
    /// A request between the users was rejected.
    AlreadyRejected,
}

/// How the receiver of a request responded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResponse {
    /// Connect with the sender.
    Accept,
    /// Decline the request.
    Reject,
}

/// Create the user connection table in the database.
pub fn create_user_connection_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS user_connection (
            id INTEGER PRIMARY KEY,
            sender_id INTEGER NOT NULL,
            receiver_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK(sender_id != receiver_id),
            FOREIGN KEY(sender_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(receiver_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_user_connection_pair
            ON user_connection(MIN(sender_id, receiver_id), MAX(sender_id, receiver_id));",
    )?;

    Ok(())
}

/// Ask the user called `receiver_username` to connect with `sender_id`.
///
/// If the two users already have a connection in either direction, no new
/// request is made and the outcome describes the existing connection.
///
/// # Errors
/// Returns a:
/// - [Error::UnknownUsername] if no user is called `receiver_username`,
/// - [Error::SelfConnection] if the receiver is the sender,
/// - or [Error::SqlError] if some other SQL error occurred.
pub fn send_connection_request(
    sender_id: UserID,
    receiver_username: &str,
    connection: &Connection,
) -> Result<SendOutcome, Error> {
    let receiver = get_user_by_username(receiver_username, connection).map_err(|error| match error {
        Error::NotFound => Error::UnknownUsername(receiver_username.trim().to_owned()),
        error => error,
    })?;

    if receiver.id == sender_id {
        return Err(Error::SelfConnection);
    }

    if let Some(existing) = get_connection_between(sender_id, receiver.id, connection)? {
        return Ok(match existing.status {
            ConnectionStatus::Accepted => SendOutcome::AlreadyConnected,
            ConnectionStatus::Pending => SendOutcome::AlreadyPending,
            ConnectionStatus::Rejected => SendOutcome::AlreadyRejected,
        });
    }

    let request = connection
        .prepare(
            "INSERT INTO user_connection (sender_id, receiver_id, status)
             VALUES (?1, ?2, ?3)
             RETURNING id, sender_id, receiver_id, status",
        )?
        .query_row(
            (sender_id, receiver.id, ConnectionStatus::Pending),
            map_connection_row,
        )?;

    tracing::info!(
        "User {sender_id} sent connection request {} to user {}",
        request.id,
        receiver.id
    );

    Ok(SendOutcome::Sent(request))
}

/// Accept or reject the connection request `request_id` sent to `receiver_id`.
///
/// # Errors
/// Returns [Error::RespondMissingRequest] if the request does not exist or
/// was sent to someone else.
pub fn respond_to_request(
    request_id: UserConnectionId,
    receiver_id: UserID,
    response: ConnectionResponse,
    connection: &Connection,
) -> Result<UserConnection, Error> {
    let status = match response {
        ConnectionResponse::Accept => ConnectionStatus::Accepted,
        ConnectionResponse::Reject => ConnectionStatus::Rejected,
    };

    let updated = connection
        .prepare(
            "UPDATE user_connection SET status = ?1
             WHERE id = ?2 AND receiver_id = ?3
             RETURNING id, sender_id, receiver_id, status",
        )?
        .query_row((status, request_id, receiver_id), map_connection_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::RespondMissingRequest,
            error => error.into(),
        })?;

    tracing::info!(
        "User {receiver_id} {} connection request {request_id}",
        status.as_str()
    );

    Ok(updated)
}

/// Remove the connection between two users, whoever sent it.
///
/// Returns the number of connections removed, which is zero if the users
/// were not connected.
pub fn disconnect(
    user_id: UserID,
    other_user_id: UserID,
    connection: &Connection,
) -> Result<usize, Error> {
    let rows_affected = connection.execute(
        "DELETE FROM user_connection
         WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
        (user_id, other_user_id),
    )?;

    if rows_affected > 0 {
        tracing::info!("Disconnected user {user_id} from user {other_user_id}");
    }

    Ok(rows_affected)
}

/// A user's connections and outstanding requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharedOverview {
    /// Users with an accepted connection, ordered by username.
    pub partners: Vec<User>,
    /// Requests waiting for this user to respond.
    pub pending_incoming: Vec<UserConnection>,
    /// Requests this user sent that have not been answered.
    pub pending_sent: Vec<UserConnection>,
}

/// Get a user's partners and pending requests.
pub fn get_shared_overview(
    user_id: UserID,
    connection: &Connection,
) -> Result<SharedOverview, Error> {
    let partners = connection
        .prepare(
            "SELECT u.id, u.username FROM user_connection c
             INNER JOIN user u
                ON u.id = CASE WHEN c.sender_id = ?1 THEN c.receiver_id ELSE c.sender_id END
             WHERE (c.sender_id = ?1 OR c.receiver_id = ?1) AND c.status = ?2
             ORDER BY u.username",
        )?
        .query_map((user_id, ConnectionStatus::Accepted), |row| {
            Ok(User {
                id: row.get(0)?,
                username: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let pending_incoming = get_pending_requests("receiver_id", user_id, connection)?;
    let pending_sent = get_pending_requests("sender_id", user_id, connection)?;

    Ok(SharedOverview {
        partners,
        pending_incoming,
        pending_sent,
    })
}

/// What a user can see of a partner's finances.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerView {
    /// The partner being viewed.
    pub partner: User,
    /// The partner's expenses, incomes and transfers, newest first.
    pub activity: Vec<ActivityEntry>,
    /// The partner's accounts.
    pub accounts: Vec<Account>,
}

/// Get the finances of `partner_id` as seen by `viewer_id`.
///
/// # Errors
/// Returns [Error::NotConnected] unless the two users have an accepted
/// connection.
pub fn get_partner_view(
    viewer_id: UserID,
    partner_id: UserID,
    connection: &Connection,
) -> Result<PartnerView, Error> {
    let is_connected = get_connection_between(viewer_id, partner_id, connection)?
        .is_some_and(|existing| existing.status == ConnectionStatus::Accepted);

    if !is_connected {
        tracing::warn!("User {viewer_id} tried to view unconnected user {partner_id}");
        return Err(Error::NotConnected(partner_id));
    }

    Ok(PartnerView {
        partner: get_user_by_id(partner_id, connection)?,
        activity: get_activity(partner_id, connection)?,
        accounts: get_accounts_by_user(partner_id, connection)?,
    })
}

fn get_connection_between(
    user_id: UserID,
    other_user_id: UserID,
    connection: &Connection,
) -> Result<Option<UserConnection>, Error> {
    connection
        .prepare(
            "SELECT id, sender_id, receiver_id, status FROM user_connection
             WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
        )?
        .query_row((user_id, other_user_id), map_connection_row)
        .optional()
        .map_err(|error| error.into())
}

fn get_pending_requests(
    user_column: &str,
    user_id: UserID,
    connection: &Connection,
) -> Result<Vec<UserConnection>, Error> {
    connection
        .prepare(&format!(
            "SELECT id, sender_id, receiver_id, status FROM user_connection
             WHERE {user_column} = ?1 AND status = ?2
             ORDER BY id"
        ))?
        .query_map((user_id, ConnectionStatus::Pending), map_connection_row)?
        .map(|maybe_request| maybe_request.map_err(|error| error.into()))
        .collect()
}

fn map_connection_row(row: &Row) -> Result<UserConnection, rusqlite::Error> {
    Ok(UserConnection {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        status: row.get(3)?,
    })
}

#[cfg(test)]
mod connection_tests {
    use rusqlite::Connection;

    use crate::{
        Error, Money, User,
        account::{AccountKind, create_account},
        connection::{
            ConnectionResponse, ConnectionStatus, SendOutcome, UserConnection, disconnect,
            get_partner_view, get_shared_overview, respond_to_request, send_connection_request,
        },
        db::initialize,
        user::create_user,
    };

    fn get_test_connection() -> (Connection, User, User) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let alice = create_user("alice", &connection).unwrap();
        let bob = create_user("bob", &connection).unwrap();
        (connection, alice, bob)
    }

    fn send(sender: &User, receiver: &User, conn: &Connection) -> UserConnection {
        match send_connection_request(sender.id, &receiver.username, conn).unwrap() {
            SendOutcome::Sent(request) => request,
            outcome => panic!("expected a new request, got {outcome:?}"),
        }
    }

    #[test]
    fn send_creates_pending_request() {
        let (conn, alice, bob) = get_test_connection();

        let request = send(&alice, &bob, &conn);

        assert_eq!(request.sender_id, alice.id);
        assert_eq!(request.receiver_id, bob.id);
        assert_eq!(request.status, ConnectionStatus::Pending);
    }

    #[test]
    fn cannot_connect_with_self() {
        let (conn, alice, _) = get_test_connection();

        assert_eq!(
            send_connection_request(alice.id, "alice", &conn),
            Err(Error::SelfConnection)
        );
    }

    #[test]
    fn unknown_username_is_rejected() {
        let (conn, alice, _) = get_test_connection();

        assert_eq!(
            send_connection_request(alice.id, "carol", &conn),
            Err(Error::UnknownUsername("carol".to_owned()))
        );
    }

    #[test]
    fn existing_request_is_reported_in_either_direction() {
        let (conn, alice, bob) = get_test_connection();
        let request = send(&alice, &bob, &conn);

        assert_eq!(
            send_connection_request(alice.id, "bob", &conn),
            Ok(SendOutcome::AlreadyPending)
        );
        assert_eq!(
            send_connection_request(bob.id, "alice", &conn),
            Ok(SendOutcome::AlreadyPending)
        );

        respond_to_request(request.id, bob.id, ConnectionResponse::Accept, &conn).unwrap();
        assert_eq!(
            send_connection_request(bob.id, "alice", &conn),
            Ok(SendOutcome::AlreadyConnected)
        );
    }

    #[test]
    fn rejected_request_is_not_resent() {
        let (conn, alice, bob) = get_test_connection();
        let request = send(&alice, &bob, &conn);

        let rejected =
            respond_to_request(request.id, bob.id, ConnectionResponse::Reject, &conn).unwrap();

        assert_eq!(rejected.status, ConnectionStatus::Rejected);
        assert_eq!(
            send_connection_request(alice.id, "bob", &conn),
            Ok(SendOutcome::AlreadyRejected)
        );
    }

    #[test]
    fn only_receiver_can_respond() {
        let (conn, alice, bob) = get_test_connection();
        let request = send(&alice, &bob, &conn);

        assert_eq!(
            respond_to_request(request.id, alice.id, ConnectionResponse::Accept, &conn),
            Err(Error::RespondMissingRequest)
        );
        assert_eq!(
            respond_to_request(request.id + 1, bob.id, ConnectionResponse::Accept, &conn),
            Err(Error::RespondMissingRequest)
        );
    }

    #[test]
    fn shared_overview_lists_partners_and_requests() {
        let (conn, alice, bob) = get_test_connection();
        let carol = create_user("carol", &conn).unwrap();
        let dave = create_user("dave", &conn).unwrap();
        let accepted = send(&bob, &alice, &conn);
        respond_to_request(accepted.id, alice.id, ConnectionResponse::Accept, &conn).unwrap();
        let incoming = send(&carol, &alice, &conn);
        let sent = send(&alice, &dave, &conn);

        let overview = get_shared_overview(alice.id, &conn).unwrap();

        assert_eq!(overview.partners, [bob]);
        assert_eq!(overview.pending_incoming, [incoming]);
        assert_eq!(overview.pending_sent, [sent]);
    }

    #[test]
    fn partner_view_requires_accepted_connection() {
        let (conn, alice, bob) = get_test_connection();
        let request = send(&alice, &bob, &conn);

        assert_eq!(
            get_partner_view(alice.id, bob.id, &conn),
            Err(Error::NotConnected(bob.id))
        );

        respond_to_request(request.id, bob.id, ConnectionResponse::Accept, &conn).unwrap();
        let account = create_account(
            bob.id,
            "Everyday",
            AccountKind::Checking,
            Money::from_cents(10_00),
            &conn,
        )
        .unwrap();

        let view = get_partner_view(alice.id, bob.id, &conn).unwrap();
        assert_eq!(view.partner, bob);
        assert_eq!(view.accounts, [account]);
        assert!(view.activity.is_empty());
    }

    #[test]
    fn disconnect_works_from_either_side() {
        let (conn, alice, bob) = get_test_connection();
        let request = send(&alice, &bob, &conn);
        respond_to_request(request.id, bob.id, ConnectionResponse::Accept, &conn).unwrap();

        assert_eq!(disconnect(bob.id, alice.id, &conn), Ok(1));
        assert_eq!(disconnect(bob.id, alice.id, &conn), Ok(0));
        assert_eq!(
            get_partner_view(alice.id, bob.id, &conn),
            Err(Error::NotConnected(bob.id))
        );
        assert!(matches!(
            send_connection_request(alice.id, "bob", &conn),
            Ok(SendOutcome::Sent(_))
        ));
    }
}
