use super::{CatalogParam, CatalogQuery, ParamDefault, ParamKind};

const SCHEMA: CatalogParam = CatalogParam {
    name: "schema",
    kind: ParamKind::Text,
    description: "Schema name",
    default: ParamDefault::Value("public"),
};

const SCHEMA_FILTER: CatalogParam = CatalogParam {
    name: "schema",
    kind: ParamKind::Text,
    description: "Restrict to one schema; omit for all user schemas",
    default: ParamDefault::Null,
};

const TABLE_NAME: CatalogParam = CatalogParam {
    name: "table_name",
    kind: ParamKind::Text,
    description: "Table name (unquoted)",
    default: ParamDefault::Required,
};

const INCLUDE_SYSTEM: CatalogParam = CatalogParam {
    name: "include_system",
    kind: ParamKind::Boolean,
    description: "Include pg_* and information_schema objects",
    default: ParamDefault::Value("false"),
};

const fn limit(default: &'static str) -> CatalogParam {
    CatalogParam {
        name: "limit",
        kind: ParamKind::Integer,
        description: "Maximum rows to return",
        default: ParamDefault::Value(default),
    }
}

pub static CATALOG: &[CatalogQuery] = &[
    // ---------------------------------------------------------------- server
    CatalogQuery {
        name: "server_version",
        category: "server",
        description: "Server version string and numeric version",
        sql: "SELECT version() AS version, current_setting('server_version_num')::int AS version_num",
        params: &[],
    },
    CatalogQuery {
        name: "server_overview",
        category: "server",
        description: "Current database, user, listen address and uptime",
        sql: "SELECT current_database() AS database, current_user AS current_user, \
              inet_server_addr()::text AS server_addr, inet_server_port() AS server_port, \
              pg_postmaster_start_time() AS started_at, \
              (now() - pg_postmaster_start_time())::text AS uptime",
        params: &[],
    },
    CatalogQuery {
        name: "list_databases",
        category: "server",
        description: "Non-template databases with owner, encoding and size",
        sql: "SELECT d.datname AS name, pg_get_userbyid(d.datdba) AS owner, \
              pg_encoding_to_char(d.encoding) AS encoding, d.datcollate::text AS collation, \
              CASE WHEN has_database_privilege(d.datname, 'CONNECT') \
                   THEN pg_database_size(d.datname) END AS size_bytes, \
              CASE WHEN has_database_privilege(d.datname, 'CONNECT') \
                   THEN pg_size_pretty(pg_database_size(d.datname)) END AS size \
              FROM pg_database d WHERE NOT d.datistemplate ORDER BY d.datname",
        params: &[],
    },
    CatalogQuery {
        name: "list_extensions",
        category: "server",
        description: "Installed extensions",
        sql: "SELECT e.extname AS name, e.extversion AS version, n.nspname AS schema \
              FROM pg_extension e JOIN pg_namespace n ON n.oid = e.extnamespace ORDER BY 1",
        params: &[],
    },
    CatalogQuery {
        name: "available_extensions",
        category: "server",
        description: "Extensions that can be installed on this server",
        sql: "SELECT name, default_version, installed_version, comment \
              FROM pg_available_extensions ORDER BY name",
        params: &[],
    },
    // ---------------------------------------------------------------- schema
    CatalogQuery {
        name: "list_schemas",
        category: "schema",
        description: "Schemas with their owners",
        sql: "SELECT n.nspname AS schema_name, pg_get_userbyid(n.nspowner) AS owner \
              FROM pg_namespace n \
              WHERE $1::bool OR (n.nspname NOT LIKE 'pg\\_%' AND n.nspname <> 'information_schema') \
              ORDER BY 1",
        params: &[INCLUDE_SYSTEM],
    },
    CatalogQuery {
        name: "list_tables",
        category: "schema",
        description: "Tables and views in a schema",
        sql: "SELECT table_name, table_type FROM information_schema.tables \
              WHERE table_schema = $1 ORDER BY table_name",
        params: &[SCHEMA],
    },
    CatalogQuery {
        name: "describe_table",
        category: "schema",
        description: "Columns of a table with type, nullability and default",
        sql: "SELECT column_name, data_type, is_nullable, column_default, \
              character_maximum_length, ordinal_position \
              FROM information_schema.columns \
              WHERE table_name = $1 AND table_schema = $2 ORDER BY ordinal_position",
        params: &[TABLE_NAME, SCHEMA],
    },
    CatalogQuery {
        name: "table_constraints",
        category: "schema",
        description: "Primary key, foreign key, unique, check and exclusion constraints of a table",
        sql: "SELECT con.conname AS constraint_name, \
              CASE con.contype WHEN 'p' THEN 'PRIMARY KEY' WHEN 'f' THEN 'FOREIGN KEY' \
                   WHEN 'u' THEN 'UNIQUE' WHEN 'c' THEN 'CHECK' WHEN 'x' THEN 'EXCLUSION' \
                   ELSE con.contype::text END AS constraint_type, \
              pg_get_constraintdef(con.oid) AS definition \
              FROM pg_constraint con \
              JOIN pg_class c ON c.oid = con.conrelid \
              JOIN pg_namespace n ON n.oid = c.relnamespace \
              WHERE c.relname = $1 AND n.nspname = $2 ORDER BY 1",
        params: &[TABLE_NAME, SCHEMA],
    },
    CatalogQuery {
        name: "list_views",
        category: "schema",
        description: "Views in a schema with their definitions",
        sql: "SELECT table_name AS view_name, view_definition FROM information_schema.views \
              WHERE table_schema = $1 ORDER BY 1",
        params: &[SCHEMA],
    },
    CatalogQuery {
        name: "list_functions",
        category: "schema",
        description: "Functions and procedures in a schema",
        sql: "SELECT p.proname AS function_name, \
              pg_get_function_identity_arguments(p.oid) AS arguments, \
              pg_get_function_result(p.oid) AS result_type, l.lanname AS language \
              FROM pg_proc p \
              JOIN pg_namespace n ON n.oid = p.pronamespace \
              JOIN pg_language l ON l.oid = p.prolang \
              WHERE n.nspname = $1 ORDER BY 1, 2",
        params: &[SCHEMA],
    },
    CatalogQuery {
        name: "list_sequences",
        category: "schema",
        description: "Sequences in a schema",
        sql: "SELECT sequence_name, data_type, start_value, increment \
              FROM information_schema.sequences WHERE sequence_schema = $1 ORDER BY 1",
        params: &[SCHEMA],
    },
    // ------------------------------------------------------------- activity
    CatalogQuery {
        name: "active_sessions",
        category: "activity",
        description: "Client sessions with state, wait event and current query",
        sql: "SELECT pid, usename, application_name, client_addr::text AS client_addr, state, \
              wait_event_type, wait_event, backend_start, query_start, \
              (now() - query_start)::text AS running_for, left(query, $1::int) AS query \
              FROM pg_stat_activity \
              WHERE backend_type = 'client backend' AND ($2::bool OR state <> 'idle') \
              ORDER BY query_start NULLS LAST",
        params: &[
            CatalogParam {
                name: "max_query_length",
                kind: ParamKind::Integer,
                description: "Truncate query text to this many characters",
                default: ParamDefault::Value("500"),
            },
            CatalogParam {
                name: "include_idle",
                kind: ParamKind::Boolean,
                description: "Include idle sessions",
                default: ParamDefault::Value("false"),
            },
        ],
    },
    CatalogQuery {
        name: "long_running_queries",
        category: "activity",
        description: "Non-idle statements running longer than a threshold",
        sql: "SELECT pid, usename, state, (now() - query_start)::text AS running_for, query \
              FROM pg_stat_activity \
              WHERE state <> 'idle' AND pid <> pg_backend_pid() \
                AND now() - query_start > $1::int * interval '1 second' \
              ORDER BY query_start",
        params: &[CatalogParam {
            name: "min_seconds",
            kind: ParamKind::Integer,
            description: "Minimum runtime in seconds",
            default: ParamDefault::Value("60"),
        }],
    },
    CatalogQuery {
        name: "connection_counts",
        category: "activity",
        description: "Client connections grouped by database, user and state",
        sql: "SELECT datname, usename, state, count(*) AS connections \
              FROM pg_stat_activity WHERE backend_type = 'client backend' \
              GROUP BY 1, 2, 3 ORDER BY connections DESC",
        params: &[],
    },
    CatalogQuery {
        name: "connection_utilization",
        category: "activity",
        description: "Open backends against max_connections",
        sql: "SELECT count(*) AS connections, \
              current_setting('max_connections')::int AS max_connections, \
              round(100.0 * count(*) / current_setting('max_connections')::int, 1) AS percent_used \
              FROM pg_stat_activity",
        params: &[],
    },
    // ---------------------------------------------------------------- locks
    CatalogQuery {
        name: "blocking_locks",
        category: "locks",
        description: "Sessions waiting on locks and the sessions blocking them",
        sql: "SELECT blocked.pid AS blocked_pid, blocked.usename AS blocked_user, \
              blocking.pid AS blocking_pid, blocking.usename AS blocking_user, \
              blocked.query AS blocked_query, blocking.query AS blocking_query, \
              (now() - blocked.query_start)::text AS blocked_for \
              FROM pg_stat_activity blocked \
              CROSS JOIN LATERAL unnest(pg_blocking_pids(blocked.pid)) AS b(pid) \
              JOIN pg_stat_activity blocking ON blocking.pid = b.pid \
              ORDER BY blocked.query_start",
        params: &[],
    },
    CatalogQuery {
        name: "lock_summary",
        category: "locks",
        description: "Held and awaited locks grouped by type and mode",
        sql: "SELECT locktype, mode, granted, count(*) AS lock_count \
              FROM pg_locks GROUP BY 1, 2, 3 ORDER BY lock_count DESC",
        params: &[],
    },
    // --------------------------------------------------------------- tables
    CatalogQuery {
        name: "table_sizes",
        category: "tables",
        description: "Largest tables by total size including indexes and TOAST",
        sql: "SELECT n.nspname AS schema_name, c.relname AS table_name, \
              pg_total_relation_size(c.oid) AS total_bytes, \
              pg_size_pretty(pg_total_relation_size(c.oid)) AS total_size, \
              pg_size_pretty(pg_relation_size(c.oid)) AS table_size, \
              pg_size_pretty(pg_indexes_size(c.oid)) AS index_size \
              FROM pg_class c JOIN pg_namespace n ON n.oid = c.relnamespace \
              WHERE c.relkind IN ('r', 'p', 'm') \
                AND n.nspname NOT IN ('pg_catalog', 'information_schema') \
                AND n.nspname NOT LIKE 'pg\\_toast%' \
              ORDER BY total_bytes DESC LIMIT $1",
        params: &[limit("20")],
    },
    CatalogQuery {
        name: "table_stats",
        category: "tables",
        description: "Scan counts, live/dead tuples and last vacuum/analyze times",
        sql: "SELECT schemaname, relname AS table_name, seq_scan, idx_scan, \
              n_live_tup, n_dead_tup, last_vacuum, last_autovacuum, last_analyze, last_autoanalyze \
              FROM pg_stat_user_tables \
              WHERE $1::text IS NULL OR schemaname = $1 \
              ORDER BY n_live_tup DESC LIMIT $2",
        params: &[SCHEMA_FILTER, limit("50")],
    },
    CatalogQuery {
        name: "table_privileges",
        category: "tables",
        description: "Privileges granted on a table",
        sql: "SELECT grantee, privilege_type, is_grantable \
              FROM information_schema.role_table_grants \
              WHERE table_name = $1 AND table_schema = $2 ORDER BY grantee, privilege_type",
        params: &[TABLE_NAME, SCHEMA],
    },
    // -------------------------------------------------------------- indexes
    CatalogQuery {
        name: "table_indexes",
        category: "indexes",
        description: "Index definitions of a table",
        sql: "SELECT indexname AS index_name, indexdef AS definition FROM pg_indexes \
              WHERE tablename = $1 AND schemaname = $2 ORDER BY 1",
        params: &[TABLE_NAME, SCHEMA],
    },
    CatalogQuery {
        name: "index_usage",
        category: "indexes",
        description: "Index scan counts and sizes, least used first",
        sql: "SELECT schemaname, relname AS table_name, indexrelname AS index_name, idx_scan, \
              pg_size_pretty(pg_relation_size(indexrelid)) AS index_size \
              FROM pg_stat_user_indexes \
              WHERE $1::text IS NULL OR schemaname = $1 \
              ORDER BY idx_scan ASC, pg_relation_size(indexrelid) DESC",
        params: &[SCHEMA_FILTER],
    },
    CatalogQuery {
        name: "unused_indexes",
        category: "indexes",
        description: "Never-scanned indexes that do not back a unique constraint",
        sql: "SELECT s.schemaname, s.relname AS table_name, s.indexrelname AS index_name, \
              pg_size_pretty(pg_relation_size(s.indexrelid)) AS index_size \
              FROM pg_stat_user_indexes s JOIN pg_index i ON i.indexrelid = s.indexrelid \
              WHERE s.idx_scan = 0 AND NOT i.indisunique \
              ORDER BY pg_relation_size(s.indexrelid) DESC",
        params: &[],
    },
    // ---------------------------------------------------------- performance
    CatalogQuery {
        name: "cache_hit_ratio",
        category: "performance",
        description: "Buffer cache hit percentage per database",
        sql: "SELECT datname, blks_hit, blks_read, \
              round(100.0 * blks_hit / nullif(blks_hit + blks_read, 0), 2) AS hit_pct \
              FROM pg_stat_database WHERE datname IS NOT NULL ORDER BY 1",
        params: &[],
    },
    CatalogQuery {
        name: "database_stats",
        category: "performance",
        description: "Transaction, deadlock and temp file counters for the current database",
        sql: "SELECT datname, numbackends, xact_commit, xact_rollback, deadlocks, \
              temp_files, temp_bytes, stats_reset \
              FROM pg_stat_database WHERE datname = current_database()",
        params: &[],
    },
    // ---------------------------------------------------------- maintenance
    CatalogQuery {
        name: "dead_tuples",
        category: "maintenance",
        description: "Tables with many dead tuples and their last autovacuum",
        sql: "SELECT schemaname, relname AS table_name, n_live_tup, n_dead_tup, \
              round(100.0 * n_dead_tup / nullif(n_live_tup + n_dead_tup, 0), 2) AS dead_pct, \
              last_autovacuum \
              FROM pg_stat_user_tables WHERE n_dead_tup >= $1 ORDER BY n_dead_tup DESC",
        params: &[CatalogParam {
            name: "min_dead_tuples",
            kind: ParamKind::Integer,
            description: "Only tables with at least this many dead tuples",
            default: ParamDefault::Value("1000"),
        }],
    },
    CatalogQuery {
        name: "vacuum_progress",
        category: "maintenance",
        description: "Running VACUUM operations",
        sql: "SELECT pid, datname, relid::regclass::text AS table_name, phase, \
              heap_blks_total, heap_blks_scanned, heap_blks_vacuumed \
              FROM pg_stat_progress_vacuum",
        params: &[],
    },
    CatalogQuery {
        name: "xid_wraparound",
        category: "maintenance",
        description: "Transaction ID age per database",
        sql: "SELECT datname, age(datfrozenxid) AS xid_age, \
              round(100.0 * age(datfrozenxid) / 2147483647, 2) AS pct_to_wraparound \
              FROM pg_database ORDER BY 2 DESC",
        params: &[],
    },
    // --------------------------------------------------------------- config
    CatalogQuery {
        name: "settings",
        category: "config",
        description: "Server settings, optionally filtered by a name pattern",
        sql: "SELECT name, setting, unit, category, short_desc, source, pending_restart \
              FROM pg_settings \
              WHERE $1::text IS NULL OR name ILIKE '%' || $1 || '%' \
              ORDER BY category, name",
        params: &[CatalogParam {
            name: "pattern",
            kind: ParamKind::Text,
            description: "Substring of the setting name",
            default: ParamDefault::Null,
        }],
    },
    CatalogQuery {
        name: "changed_settings",
        category: "config",
        description: "Settings whose value does not come from the built-in default",
        sql: "SELECT name, setting, unit, source, sourcefile \
              FROM pg_settings WHERE source NOT IN ('default', 'override') ORDER BY name",
        params: &[],
    },
    // ------------------------------------------------------------- security
    CatalogQuery {
        name: "list_roles",
        category: "security",
        description: "Roles and their attributes",
        sql: "SELECT rolname, rolsuper, rolcreaterole, rolcreatedb, rolcanlogin, \
              rolreplication, rolconnlimit, rolvaliduntil \
              FROM pg_roles WHERE $1::bool OR rolname NOT LIKE 'pg\\_%' ORDER BY 1",
        params: &[INCLUDE_SYSTEM],
    },
    // ---------------------------------------------------------- replication
    CatalogQuery {
        name: "replication_status",
        category: "replication",
        description: "Connected standbys and their lag",
        sql: "SELECT pid, usename, application_name, client_addr::text AS client_addr, state, \
              sync_state, sent_lsn::text AS sent_lsn, replay_lsn::text AS replay_lsn, \
              replay_lag::text AS replay_lag \
              FROM pg_stat_replication ORDER BY application_name",
        params: &[],
    },
    CatalogQuery {
        name: "replication_slots",
        category: "replication",
        description: "Replication slots and whether they are in use",
        sql: "SELECT slot_name, plugin, slot_type, database, active, \
              restart_lsn::text AS restart_lsn \
              FROM pg_replication_slots ORDER BY slot_name",
        params: &[],
    },
];
