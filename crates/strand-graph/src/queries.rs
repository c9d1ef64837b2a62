//! Query templates and predicate names for result-tree backends.
//!
//! Every template takes its inputs as named variables; nothing user-supplied
//! is ever interpolated into query text.
//!
//! The entity templates are DQL. [`META_ROOT`] and the fragments appended to it
//! are Gremlin, so a [`GraphClient`](crate::GraphClient) serving `get_meta` must
//! also accept Gremlin traversals with `classKey` bound.

/// Predicate names shared by the writer, the decoder, and bootstrap.
pub mod predicates {
    pub const UID: &str = "_uid_";
    pub const CLASS: &str = "class";
    pub const TYPE: &str = "type";
    pub const REVERSE_TYPE: &str = "~type";
    pub const ID: &str = "id";
    pub const REVERSE_ID: &str = "~id";
    pub const UUID: &str = "uuid";
    pub const AT_CONTEXT: &str = "atContext";
    pub const ACTION_OF: &str = "action.of";
    pub const REVERSE_ACTION_OF: &str = "~action.of";
    pub const ACTION_TARGET: &str = "action.target";

    pub const CREATION_TIME_MS: &str = "creationTimeMs";
    pub const LAST_SEEN_TIME_MS: &str = "lastSeenTimeMs";
    pub const LAST_UPDATE_TIME_MS: &str = "lastUpdateTimeMs";
    pub const LAST_USE_TIME_MS: &str = "lastUseTimeMs";
    pub const CREATION_TIME_UNIX: &str = "creationTimeUnix";
    pub const LAST_UPDATE_TIME_UNIX: &str = "lastUpdateTimeUnix";

    pub const THING_TIMESTAMPS: [&str; 4] = [
        CREATION_TIME_MS,
        LAST_SEEN_TIME_MS,
        LAST_UPDATE_TIME_MS,
        LAST_USE_TIME_MS,
    ];
    pub const ACTION_TIMESTAMPS: [&str; 2] = [CREATION_TIME_UNIX, LAST_UPDATE_TIME_UNIX];

    /// Names the connectors write and read for structure. A user property
    /// with one of these names would not survive a round trip.
    pub const RESERVED: [&str; 14] = [
        UID,
        CLASS,
        TYPE,
        ID,
        UUID,
        AT_CONTEXT,
        ACTION_OF,
        ACTION_TARGET,
        CREATION_TIME_MS,
        LAST_SEEN_TIME_MS,
        LAST_UPDATE_TIME_MS,
        LAST_USE_TIME_MS,
        CREATION_TIME_UNIX,
        LAST_UPDATE_TIME_UNIX,
    ];

    pub fn is_reserved(name: &str) -> bool {
        RESERVED.contains(&name)
    }

    /// Alias used by count queries.
    pub const TOTAL: &str = "total";
}

/// Class node by key. Variables: `$class`.
pub const CLASS_BY_KEY: &str = r#"query class($class: string) {
  class(func: eq(class, $class)) {
    _uid_
    class
  }
}"#;

/// Every class node.
pub const ALL_CLASSES: &str = r#"{
  classes(func: has(class)) {
    _uid_
    class
  }
}"#;

/// UUID anchor, identity node, and the identity's action subjects.
/// Variables: `$uuid`.
pub const NODE_BY_UUID: &str = r#"query node($uuid: string) {
  node(func: eq(uuid, $uuid)) {
    _uid_
    uuid
    ~id {
      _uid_
      ~action.of {
        _uid_
      }
    }
  }
}"#;

/// Point lookup of a thing. Variables: `$uuid`.
pub const GET_THING: &str = r#"query get($uuid: string) {
  get(func: eq(uuid, $uuid)) {
    uuid
    ~id {
      expand(_all_) {
        expand(_all_) {
          expand(_all_)
        }
      }
    }
  }
}"#;

/// Point lookup of an action, including its subject. Variables: `$uuid`.
pub const GET_ACTION: &str = r#"query get($uuid: string) {
  get(func: eq(uuid, $uuid)) {
    uuid
    ~id {
      expand(_all_) {
        expand(_all_) {
          expand(_all_)
        }
      }
      ~action.of {
        id {
          uuid
        }
        type {
          class
        }
      }
    }
  }
}"#;

/// One page of things, newest first. Variables: `$first`, `$offset`.
pub const LIST_THINGS: &str = r#"query things($first: int, $offset: int) {
  things(func: has(creationTimeMs), orderdesc: creationTimeMs, first: $first, offset: $offset) {
    expand(_all_) {
      expand(_all_) {
        expand(_all_)
      }
    }
  }
}"#;

/// Total number of things; same filter as [`LIST_THINGS`].
pub const COUNT_THINGS: &str = r#"{
  totalResults(func: has(creationTimeMs)) {
    total: count(uid)
  }
}"#;

/// One page of the actions targeting a thing, newest first.
/// Variables: `$uuid`, `$first`, `$offset`.
pub const LIST_ACTIONS: &str = r#"query actions($uuid: string, $first: int, $offset: int) {
  target(func: eq(uuid, $uuid)) {
    ~id {
      actions: ~action.target (orderdesc: creationTimeUnix, first: $first, offset: $offset) {
        expand(_all_) {
          expand(_all_) {
            expand(_all_)
          }
        }
        ~action.of {
          id {
            uuid
          }
          type {
            class
          }
        }
      }
    }
  }
}"#;

/// Total number of actions targeting a thing. Variables: `$uuid`.
pub const COUNT_ACTIONS: &str = r#"query count($uuid: string) {
  totalResults(func: eq(uuid, $uuid)) {
    ~id {
      total: count(~action.target)
    }
  }
}"#;

/// Identity and UUID anchor uids of every instance of a class.
/// Variables: `$class`.
pub const CLASS_INSTANCES: &str = r#"query instances($class: string) {
  instances(func: eq(class, $class)) {
    _uid_
    ~type {
      _uid_
      id {
        _uid_
      }
    }
  }
}"#;

/// Traversal root for meta queries; the meta fragment is appended to it.
/// Bindings: `classKey`.
pub const META_ROOT: &str = r#"g.V().has("class", classKey).in("type")"#;
