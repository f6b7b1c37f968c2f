pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS packages (
    pkgname TEXT NOT NULL,
    pkgver TEXT NOT NULL,
    arch TEXT NOT NULL,
    restricted INTEGER NOT NULL,
    builddate TEXT NOT NULL,
    repodata TEXT NOT NULL,
    templatedata TEXT NOT NULL,
    depends_count INTEGER,
    upstreamver TEXT NOT NULL,
    repo TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_hash (
    pkgname TEXT NOT NULL,
    date TEXT NOT NULL,
    UNIQUE(pkgname, date)
);
"#;

pub const INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS pkgname_idx ON packages (pkgname);
CREATE INDEX IF NOT EXISTS pkgver_idx ON packages (pkgver);
CREATE INDEX IF NOT EXISTS builddate_idx ON packages (builddate DESC);
CREATE INDEX IF NOT EXISTS depends_count_idx ON packages (depends_count);
CREATE INDEX IF NOT EXISTS daily_hash_idx ON daily_hash (date);
"#;

/// Rows that may show up in the newest and longest-name listings. GLOB keeps
/// the match case-sensitive, in line with `pkgcat_core::daily::dailyable`.
pub const ELIGIBLE: &str =
    "repo NOT GLOB 'multilib*' AND pkgname NOT GLOB '*-devel' AND pkgname NOT GLOB '*-dbg'";
