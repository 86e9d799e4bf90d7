use std::marker::PhantomData;

use sea_query::{Alias as SeaAlias, ColumnDef, Condition, Expr as SeaExpr, Func as SeaFunc, Iden, Order as SeaOrder, PostgresQueryBuilder, Query as SeaQuery, Table};
use sea_query_binder::SqlxBinder;
use sqlx::{Row, postgres::PgRow};
use tracing::trace;

use crate::{
    Result, ScrapeflowError,
    store::{DbCollection, DbCollectionIden, DbDocument, PageData, map_db_err, query},
    utils,
};

use super::DbConnection;

/// One table per collection: the record lives as a JSON document beside its id.
#[derive(Debug)]
pub struct DocCollection<T> {
    conn: DbConnection,
    table: String,
    _item: PhantomData<fn() -> T>,
}

#[derive(Iden)]
enum DocIden {
    Id,
    Doc,
    Timestamp,
}

fn is_field_name(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn into_condition(q: &query::Query) -> Condition {
    let mut cond = Condition::all();
    for (key, value) in q.filters() {
        cond = cond.add(SeaExpr::cust_with_values("(doc::jsonb -> $1) = $2::jsonb", [key.clone(), value.to_string()]));
    }
    cond
}

fn from_row<T: DbDocument>(row: &PgRow) -> Result<T> {
    let doc: String = row.try_get("doc").map_err(map_db_err)?;
    Ok(serde_json::from_str(&doc)?)
}

impl<T> DocCollection<T>
where
    T: DbDocument + DbCollectionIden,
{
    pub fn new(conn: &DbConnection) -> Self {
        Self {
            conn: conn.clone(),
            table: T::iden().as_ref().to_string(),
            _item: PhantomData,
        }
    }

    fn table(&self) -> SeaAlias {
        SeaAlias::new(self.table.as_str())
    }

    pub fn init(&self) -> Result<()> {
        let sql = [Table::create()
            .table(self.table())
            .if_not_exists()
            .col(ColumnDef::new(DocIden::Id).string().not_null().primary_key())
            .col(ColumnDef::new(DocIden::Doc).text().not_null())
            .col(ColumnDef::new(DocIden::Timestamp).big_integer().default(0))
            .build(PostgresQueryBuilder)];

        self.conn.batch_execute(&sql).map_err(map_db_err)
    }
}

impl<T> DbCollection for DocCollection<T>
where
    T: DbDocument + DbCollectionIden,
{
    type Item = T;

    fn exists(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::exists({})", self.table, id);
        let (sql, values) = SeaQuery::select()
            .from(self.table())
            .expr(SeaFunc::count(SeaExpr::col(DocIden::Id)))
            .and_where(SeaExpr::col(DocIden::Id).eq(id))
            .build_sqlx(PostgresQueryBuilder);

        let count = self.conn.query_one(sql.as_str(), values).map(|row| row.get::<i64, usize>(0)).map_err(map_db_err)?;

        Ok(count > 0)
    }

    fn find(
        &self,
        id: &str,
    ) -> Result<Self::Item> {
        trace!("{}::find({})", self.table, id);
        let (sql, values) = SeaQuery::select().from(self.table()).column(DocIden::Doc).and_where(SeaExpr::col(DocIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        match self.conn.query_optional(&sql, values).map_err(map_db_err)? {
            Some(row) => from_row(&row),
            None => Err(ScrapeflowError::Store(format!("{} not found: {}", self.table, id))),
        }
    }

    fn query(
        &self,
        q: &query::Query,
    ) -> Result<PageData<Self::Item>> {
        trace!("{}::query({:?})", self.table, q);
        let filter = into_condition(q);

        let mut count_query = SeaQuery::select();
        count_query.from(self.table()).expr(SeaFunc::count(SeaExpr::col(DocIden::Id)));

        let mut query = SeaQuery::select();
        query.column(DocIden::Doc).from(self.table());

        if !filter.is_empty() {
            count_query.cond_where(filter.clone());
            query.cond_where(filter);
        }

        for (order, rev) in q.order_by().iter().filter(|(key, _)| is_field_name(key)) {
            query.order_by_expr(
                SeaExpr::cust(format!("doc::jsonb -> '{}'", order)),
                if *rev {
                    SeaOrder::Desc
                } else {
                    SeaOrder::Asc
                },
            );
        }
        if q.limit() > 0 {
            query.limit(q.limit() as u64);
        }
        let (sql, values) = query.offset(q.offset() as u64).build_sqlx(PostgresQueryBuilder);

        let (count_sql, count_values) = count_query.build_sqlx(PostgresQueryBuilder);
        let count = self.conn.query_one(count_sql.as_str(), count_values).map_err(map_db_err)?.get::<i64, usize>(0) as usize;
        let rows = self.conn.query(&sql, values).map_err(map_db_err)?.iter().map(from_row::<T>).collect::<Result<Vec<_>>>()?;
        Ok(PageData::new(count, q, rows))
    }

    fn create(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::create({})", self.table, data.id());
        let doc = serde_json::to_string(data)?;
        let (sql, sql_values) = SeaQuery::insert()
            .into_table(self.table())
            .columns([DocIden::Id, DocIden::Doc, DocIden::Timestamp])
            .values([data.id().into(), doc.into(), utils::time::time_millis().into()])
            .map_err(map_db_err)?
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn update(
        &self,
        data: &Self::Item,
    ) -> Result<bool> {
        trace!("{}::update({})", self.table, data.id());
        let doc = serde_json::to_string(data)?;
        let (sql, sql_values) = SeaQuery::update()
            .table(self.table())
            .values([(DocIden::Doc, doc.into()), (DocIden::Timestamp, utils::time::time_millis().into())])
            .and_where(SeaExpr::col(DocIden::Id).eq(data.id()))
            .build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), sql_values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }

    fn delete(
        &self,
        id: &str,
    ) -> Result<bool> {
        trace!("{}::delete({})", self.table, id);
        let (sql, values) = SeaQuery::delete().from_table(self.table()).and_where(SeaExpr::col(DocIden::Id).eq(id)).build_sqlx(PostgresQueryBuilder);

        let result = self.conn.execute(sql.as_str(), values).map_err(map_db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod test {
    use super::is_field_name;

    #[test]
    fn test_order_keys_are_plain_field_names() {
        assert!(is_field_name("create_time"));
        assert!(!is_field_name("seq'; drop table x; --"));
        assert!(!is_field_name(""));
    }
}
