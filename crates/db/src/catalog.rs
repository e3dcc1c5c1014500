//! Read-only queries against the system catalog, used to confirm the end state.

use anyhow::Context;
use sqlx::postgres::PgConnection;
use sqlx::Connection;

use dbinit_kernel::ConnectionDescriptor;

/// Login/inherit/RLS flags of a role as recorded in `pg_roles`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RoleAttributes {
    pub name: String,
    pub can_login: bool,
    pub inherit: bool,
    pub bypass_rls: bool,
}

/// One `pg_default_acl` row for a schema, with the ACL in its text form.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct DefaultAcl {
    /// `r` tables, `f` functions, `S` sequences, `T` types, `n` schemas.
    pub object_type: String,
    pub acl: String,
}

impl DefaultAcl {
    pub fn grants_to(&self, role: &str) -> bool {
        self.acl
            .trim_matches(|c| c == '{' || c == '}')
            .split(',')
            .any(|item| item.trim_matches('"').starts_with(&format!("{role}=")))
    }
}

pub struct Catalog {
    conn: PgConnection,
}

impl Catalog {
    pub async fn connect(descriptor: &ConnectionDescriptor) -> anyhow::Result<Self> {
        let conn = crate::connect(descriptor)
            .await
            .with_context(|| format!("failed to connect to {}", descriptor.redacted()))?;
        Ok(Self { conn })
    }

    pub async fn role(&mut self, name: &str) -> anyhow::Result<Option<RoleAttributes>> {
        sqlx::query_as::<_, RoleAttributes>(
            "select rolname::text as name, rolcanlogin as can_login, \
             rolinherit as inherit, rolbypassrls as bypass_rls \
             from pg_roles where rolname = $1",
        )
        .bind(name)
        .fetch_optional(&mut self.conn)
        .await
        .with_context(|| format!("failed to read role '{name}'"))
    }

    pub async fn schema_count(&mut self, name: &str) -> anyhow::Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("select count(*) from pg_namespace where nspname = $1")
                .bind(name)
                .fetch_one(&mut self.conn)
                .await
                .with_context(|| format!("failed to look up schema '{name}'"))?;
        Ok(count)
    }

    pub async fn has_schema_usage(&mut self, role: &str, schema: &str) -> anyhow::Result<bool> {
        let (granted,): (bool,) =
            sqlx::query_as("select has_schema_privilege($1::name, $2::text, 'USAGE')")
                .bind(role)
                .bind(schema)
                .fetch_one(&mut self.conn)
                .await
                .with_context(|| format!("failed to check usage of '{schema}' for '{role}'"))?;
        Ok(granted)
    }

    pub async fn has_table_privilege(
        &mut self,
        role: &str,
        table: &str,
        privilege: &str,
    ) -> anyhow::Result<bool> {
        let (granted,): (bool,) =
            sqlx::query_as("select has_table_privilege($1::name, $2::text, $3::text)")
                .bind(role)
                .bind(table)
                .bind(privilege)
                .fetch_one(&mut self.conn)
                .await
                .with_context(|| {
                    format!("failed to check {privilege} on '{table}' for '{role}'")
                })?;
        Ok(granted)
    }

    pub async fn default_acls(&mut self, schema: &str) -> anyhow::Result<Vec<DefaultAcl>> {
        sqlx::query_as::<_, DefaultAcl>(
            "select d.defaclobjtype::text as object_type, d.defaclacl::text as acl \
             from pg_default_acl d \
             join pg_namespace n on n.oid = d.defaclnamespace \
             where n.nspname = $1 \
             order by d.defaclobjtype",
        )
        .bind(schema)
        .fetch_all(&mut self.conn)
        .await
        .with_context(|| format!("failed to read default privileges of '{schema}'"))
    }

    /// Run arbitrary SQL on the inspection connection; used by tests to stage objects.
    pub async fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        sqlx::raw_sql(sql)
            .execute(&mut self.conn)
            .await
            .with_context(|| format!("failed to execute '{sql}'"))?;
        Ok(())
    }

    pub async fn close(self) -> anyhow::Result<()> {
        self.conn
            .close()
            .await
            .context("failed to close catalog connection")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_acl_matches_grantee_prefix() {
        let acl = DefaultAcl {
            object_type: "r".into(),
            acl: "{anon=arwdDxt/postgres,authenticated=arwdDxt/postgres,service_role=arwdDxt/postgres}"
                .into(),
        };
        assert!(acl.grants_to("anon"));
        assert!(acl.grants_to("service_role"));
        assert!(!acl.grants_to("service"));
        assert!(!acl.grants_to("postgres"));
    }

    #[test]
    fn default_acl_handles_quoted_entries() {
        let acl = DefaultAcl {
            object_type: "S".into(),
            acl: "{\"anon=rwU/postgres\"}".into(),
        };
        assert!(acl.grants_to("anon"));
    }
}
