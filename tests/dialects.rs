//! Generated SQL checked against each dialect's parser.
use std::rc::Rc;

use sqladapter::adapter::{MsSqlAdapter, MySqlAdapter, PgSqlAdapter};
use sqladapter::driver::Script;
use sqladapter::{
    Condition, DeleteRequest, InsertRequest, InstanceConfig, SelectRequest, Session, SqlAdapter,
    UpdateRequest, Value,
};
use sqlparser::dialect::{Dialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

fn session(driver: &str) -> Session {
    Session::new("default", InstanceConfig::new(driver), Script::new().connector())
}

fn mysql() -> Rc<dyn SqlAdapter> {
    Rc::new(MySqlAdapter::new(session("mysql")))
}

fn mssql() -> Rc<dyn SqlAdapter> {
    Rc::new(MsSqlAdapter::new(session("mssql")))
}

fn pgsql() -> Rc<dyn SqlAdapter> {
    Rc::new(PgSqlAdapter::new(session("pgsql")))
}

fn assert_parses(dialect: &dyn Dialect, sql: &str) {
    let parsed = Parser::parse_sql(dialect, sql);
    assert!(parsed.is_ok(), "{} did not parse: {:?}", sql, parsed.err());
    assert_eq!(parsed.map(|s| s.len()).unwrap_or(0), 1);
}

fn filtered(adapter: Rc<dyn SqlAdapter>) -> SelectRequest {
    SelectRequest::from_table(adapter, "users")
        .field_list(["id", "name"])
        .and_where(("age", ">=", 18))
        .and_where(("role", vec!["admin", "owner"]))
        .and_where(Condition::or([
            Condition::eq("name", "o'hara"),
            Condition::eq("deleted", false),
        ]))
        .order_by("name")
}

#[test]
fn test_mysql_select_parses() {
    let sql = filtered(mysql()).number(10).sql().unwrap();
    assert_eq!(
        sql,
        "SELECT id, name FROM `users` WHERE `age` >= 18 AND `role` IN ('admin','owner') \
         AND ((`name` = 'o''hara') OR (`deleted` = 0)) ORDER BY name LIMIT 10"
    );
    assert_parses(&MySqlDialect {}, &sql);
}

#[test]
fn test_mysql_join_parses() {
    let sql = SelectRequest::from_table(mysql(), "users")
        .join_smart("groups", None, Some("group_id"), "id", true)
        .distinct(true)
        .sql()
        .unwrap();
    assert_parses(&MySqlDialect {}, &sql);
}

#[test]
fn test_postgres_statements_parse() {
    let dialect = PostgreSqlDialect {};
    let select = filtered(pgsql()).number(10).from_offset(30).sql().unwrap();
    assert!(select.ends_with("ORDER BY name LIMIT 10 OFFSET 30"));
    assert_parses(&dialect, &select);

    let insert = InsertRequest::new(pgsql(), "users")
        .add_row([("name", Value::from("ann")), ("age", Value::Int(3))])
        .add_row([("name", Value::from("bo")), ("age", Value::Null)])
        .sql()
        .unwrap();
    assert_parses(&dialect, &insert);

    let update = UpdateRequest::new(pgsql(), "users")
        .set("active", true)
        .and_where(("id", 4))
        .sql()
        .unwrap();
    assert_eq!(update, "UPDATE \"users\" SET \"active\"=TRUE WHERE \"id\" = 4");
    assert_parses(&dialect, &update);

    let delete = DeleteRequest::new(pgsql(), "users")
        .and_where(("id", vec![1, 2, 3]))
        .sql()
        .unwrap();
    assert_eq!(delete, "DELETE FROM \"users\" WHERE \"id\" IN (1,2,3)");
    assert_parses(&dialect, &delete);
}

#[test]
fn test_mssql_paged_select_parses() {
    let paged = filtered(mssql()).number(10).from_offset(20).sql().unwrap();
    assert!(paged.starts_with("SELECT * FROM (SELECT id, name, ROW_NUMBER() OVER(ORDER BY name)"));
    assert!(paged.ends_with(") AS a WHERE a.rownum BETWEEN 20 AND 30"));
    assert_parses(&MsSqlDialect {}, &paged);

    let fallback = SelectRequest::from_table(mssql(), "users").number(3).sql().unwrap();
    assert_eq!(
        fallback,
        "SELECT * FROM (SELECT \"users\".*, ROW_NUMBER() OVER(ORDER BY id) AS rownum \
         FROM \"users\") AS a WHERE a.rownum <= 3"
    );
    assert_parses(&MsSqlDialect {}, &fallback);
}

#[test]
fn test_count_wraps_rendered_query() {
    let script = Script::new().on_query("COUNT(*)", vec![sqladapter::Row::from_pairs([("row_count", 2)])]);
    let adapter: Rc<dyn SqlAdapter> = Rc::new(PgSqlAdapter::new(Session::new(
        "default",
        InstanceConfig::new("pgsql"),
        script.connector(),
    )));
    let request = filtered(adapter).number(5);
    assert_eq!(request.count(None).unwrap(), 2);
    let sql = script.last().unwrap();
    assert!(sql.starts_with("SELECT COUNT(*) row_count FROM (SELECT id, name FROM \"users\""));
    assert!(sql.ends_with("LIMIT 5) oq"));
    assert_parses(&PostgreSqlDialect {}, &sql);
}
