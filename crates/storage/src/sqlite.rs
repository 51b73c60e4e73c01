use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

use atelier_core::{
    Contact, FinancialState, FulfillmentState, ItemStatus, LineItemId, OrderId, ProductId,
    RefundState, SourceKind, SourceRef,
};

use crate::error::StoreError;
use crate::traits::{LineItem, Order, OrderSource, Product, Store};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StoreError> {
    v.try_into()
        .map_err(|_| StoreError::Serialization(format!("invalid {label} length")))
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>, StoreError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| StoreError::Serialization(format!("invalid timestamp: {ms}")))
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

const ORDER_COLUMNS: &str = "order_id, canonical_kind, canonical_source_id, display_number, \
     match_key, financial_state, fulfillment_state, cancelled_at, purchase_time, \
     email, name, phone, shipping_address";

fn read_order(row: &rusqlite::Row) -> Result<Order, StoreError> {
    let order_id_bytes: Vec<u8> = row.get(0)?;
    let canonical_kind: String = row.get(1)?;
    let canonical_source_id: String = row.get(2)?;
    let display_number: String = row.get(3)?;
    let match_key: Option<String> = row.get(4)?;
    let financial_state: String = row.get(5)?;
    let fulfillment_state: String = row.get(6)?;
    let cancelled_at: Option<i64> = row.get(7)?;
    let purchase_time: i64 = row.get(8)?;
    let email: Option<String> = row.get(9)?;
    let name: Option<String> = row.get(10)?;
    let phone: Option<String> = row.get(11)?;
    let shipping_address: Option<String> = row.get(12)?;

    Ok(Order {
        id: OrderId::from_bytes(to_array::<16>(order_id_bytes, "order_id")?),
        canonical_ref: SourceRef::new(SourceKind::parse(&canonical_kind)?, canonical_source_id),
        display_number,
        match_key,
        financial_state: FinancialState::parse(&financial_state)?,
        fulfillment_state: FulfillmentState::parse(&fulfillment_state)?,
        cancelled_at: cancelled_at.map(from_millis).transpose()?,
        purchase_time: from_millis(purchase_time)?,
        contact: Contact {
            email,
            name,
            phone,
            shipping_address,
        },
    })
}

const ITEM_COLUMNS: &str = "item_id, order_id, product_id, source_kind, source_line_id, \
     quantity, unit_price, refund_state, restocked, status, edition_number, created_at";

fn read_item(row: &rusqlite::Row) -> Result<LineItem, StoreError> {
    let item_id_bytes: Vec<u8> = row.get(0)?;
    let order_id_bytes: Vec<u8> = row.get(1)?;
    let product_id_bytes: Vec<u8> = row.get(2)?;
    let source_kind: String = row.get(3)?;
    let source_line_id: String = row.get(4)?;
    let quantity: i64 = row.get(5)?;
    let unit_price: String = row.get(6)?;
    let refund_state: String = row.get(7)?;
    let restocked: bool = row.get(8)?;
    let status: String = row.get(9)?;
    let edition_number: Option<i64> = row.get(10)?;
    let created_at: i64 = row.get(11)?;

    Ok(LineItem {
        id: LineItemId::from_bytes(to_array::<16>(item_id_bytes, "item_id")?),
        order_id: OrderId::from_bytes(to_array::<16>(order_id_bytes, "order_id")?),
        product_id: ProductId::from_bytes(to_array::<16>(product_id_bytes, "product_id")?),
        source: SourceRef::new(SourceKind::parse(&source_kind)?, source_line_id),
        quantity: quantity as u32,
        unit_price: Decimal::from_str(&unit_price)
            .map_err(|e| StoreError::Serialization(format!("invalid unit price: {e}")))?,
        refund_state: RefundState::parse(&refund_state)?,
        restocked,
        status: ItemStatus::parse(&status)?,
        edition_number: edition_number.map(|n| n as u32),
        created_at: from_millis(created_at)?,
    })
}

/// Wrapper error type used to tunnel StoreError through rusqlite's error
/// system in query_map closures that must return rusqlite::Error.
#[derive(Debug)]
struct OpaqueStoreError(String);

impl std::fmt::Display for OpaqueStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for OpaqueStoreError {}

fn tunnel(e: StoreError) -> rusqlite::Error {
    match e {
        StoreError::Sqlite(sq) => sq,
        other => rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Blob,
            Box::new(OpaqueStoreError(other.to_string())),
        ),
    }
}

impl Store for SqliteStore {
    fn upsert_product(&mut self, product: &Product) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO products (product_id, title, edition_total) VALUES (?1, ?2, ?3)
             ON CONFLICT(product_id) DO UPDATE SET title = excluded.title,
                 edition_total = excluded.edition_total",
            rusqlite::params![
                product.id.as_bytes().as_slice(),
                product.title,
                product.edition_total,
            ],
        )?;
        Ok(())
    }

    fn get_product(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT product_id, title, edition_total FROM products WHERE product_id = ?1")?;
        let mut rows = stmt.query_map(
            rusqlite::params![product_id.as_bytes().as_slice()],
            |row| {
                let id_bytes: Vec<u8> = row.get(0)?;
                let title: String = row.get(1)?;
                let edition_total: Option<i64> = row.get(2)?;
                Ok((id_bytes, title, edition_total))
            },
        )?;

        match rows.next() {
            Some(Ok((id_bytes, title, edition_total))) => Ok(Some(Product {
                id: ProductId::from_bytes(to_array::<16>(id_bytes, "product_id")?),
                title,
                edition_total: edition_total.map(|n| n as u32),
            })),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn all_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT product_id, title, edition_total FROM products ORDER BY product_id")?;
        let rows = stmt.query_map([], |row| {
            let id_bytes: Vec<u8> = row.get(0)?;
            let title: String = row.get(1)?;
            let edition_total: Option<i64> = row.get(2)?;
            Ok((id_bytes, title, edition_total))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id_bytes, title, edition_total) = row?;
            result.push(Product {
                id: ProductId::from_bytes(to_array::<16>(id_bytes, "product_id")?),
                title,
                edition_total: edition_total.map(|n| n as u32),
            });
        }
        Ok(result)
    }

    fn insert_order(&mut self, order: &Order) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO orders (order_id, canonical_kind, canonical_source_id, display_number, \
             match_key, financial_state, fulfillment_state, cancelled_at, purchase_time, \
             email, name, phone, shipping_address) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            rusqlite::params![
                order.id.as_bytes().as_slice(),
                order.canonical_ref.kind.as_str(),
                order.canonical_ref.id,
                order.display_number,
                order.match_key,
                order.financial_state.as_str(),
                order.fulfillment_state.as_str(),
                order.cancelled_at.map(to_millis),
                to_millis(order.purchase_time),
                order.contact.email,
                order.contact.name,
                order.contact.phone,
                order.contact.shipping_address,
            ],
        )?;
        Ok(())
    }

    fn update_order_header(&mut self, order: &Order) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE orders SET canonical_kind = ?2, canonical_source_id = ?3, \
             display_number = ?4, match_key = ?5, financial_state = ?6, \
             fulfillment_state = ?7, cancelled_at = ?8, purchase_time = ?9 \
             WHERE order_id = ?1",
            rusqlite::params![
                order.id.as_bytes().as_slice(),
                order.canonical_ref.kind.as_str(),
                order.canonical_ref.id,
                order.display_number,
                order.match_key,
                order.financial_state.as_str(),
                order.fulfillment_state.as_str(),
                order.cancelled_at.map(to_millis),
                to_millis(order.purchase_time),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("order {}", order.id)));
        }
        Ok(())
    }

    fn update_order_contact(
        &mut self,
        order_id: OrderId,
        contact: &Contact,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE orders SET email = ?2, name = ?3, phone = ?4, shipping_address = ?5 \
             WHERE order_id = ?1",
            rusqlite::params![
                order_id.as_bytes().as_slice(),
                contact.email,
                contact.name,
                contact.phone,
                contact.shipping_address,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("order {order_id}")));
        }
        Ok(())
    }

    fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"))?;
        let mut rows = stmt.query_map(rusqlite::params![order_id.as_bytes().as_slice()], |row| {
            read_order(row).map_err(tunnel)
        })?;

        match rows.next() {
            Some(Ok(order)) => Ok(Some(order)),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY purchase_time, order_id"
        ))?;
        let orders = stmt
            .query_map([], |row| read_order(row).map_err(tunnel))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orders)
    }

    fn find_order_by_source(&self, source: &SourceRef) -> Result<Option<OrderId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id FROM order_sources WHERE source_kind = ?1 AND source_id = ?2",
        )?;
        let mut rows = stmt.query_map(
            rusqlite::params![source.kind.as_str(), source.id],
            |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(bytes)
            },
        )?;

        match rows.next() {
            Some(Ok(bytes)) => Ok(Some(OrderId::from_bytes(to_array::<16>(bytes, "order_id")?))),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn find_orders_by_match_key(&self, match_key: &str) -> Result<Vec<OrderId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT order_id FROM orders WHERE match_key = ?1 ORDER BY order_id")?;
        let rows = stmt.query_map(rusqlite::params![match_key], |row| {
            let bytes: Vec<u8> = row.get(0)?;
            Ok(bytes)
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(OrderId::from_bytes(to_array::<16>(row?, "order_id")?));
        }
        Ok(result)
    }

    fn find_orders_by_email_window(
        &self,
        email: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OrderId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id FROM orders \
             WHERE email = ?1 AND purchase_time >= ?2 AND purchase_time <= ?3 \
             ORDER BY order_id",
        )?;
        let rows = stmt.query_map(
            rusqlite::params![email, to_millis(from), to_millis(to)],
            |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(bytes)
            },
        )?;

        let mut result = Vec::new();
        for row in rows {
            result.push(OrderId::from_bytes(to_array::<16>(row?, "order_id")?));
        }
        Ok(result)
    }

    fn upsert_order_source(&mut self, source: &OrderSource) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO order_sources (source_kind, source_id, order_id, email, name, phone, shipping_address) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(source_kind, source_id) DO UPDATE SET order_id = excluded.order_id, \
                 email = excluded.email, name = excluded.name, phone = excluded.phone, \
                 shipping_address = excluded.shipping_address",
            rusqlite::params![
                source.source.kind.as_str(),
                source.source.id,
                source.order_id.as_bytes().as_slice(),
                source.contact.email,
                source.contact.name,
                source.contact.phone,
                source.contact.shipping_address,
            ],
        )?;
        Ok(())
    }

    fn get_sources(&self, order_id: OrderId) -> Result<Vec<OrderSource>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_kind, source_id, email, name, phone, shipping_address \
             FROM order_sources WHERE order_id = ?1 ORDER BY source_kind, source_id",
        )?;
        let rows = stmt.query_map(rusqlite::params![order_id.as_bytes().as_slice()], |row| {
            let kind: String = row.get(0)?;
            let id: String = row.get(1)?;
            let email: Option<String> = row.get(2)?;
            let name: Option<String> = row.get(3)?;
            let phone: Option<String> = row.get(4)?;
            let shipping_address: Option<String> = row.get(5)?;
            Ok((kind, id, email, name, phone, shipping_address))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (kind, id, email, name, phone, shipping_address) = row?;
            result.push(OrderSource {
                order_id,
                source: SourceRef::new(SourceKind::parse(&kind)?, id),
                contact: Contact {
                    email,
                    name,
                    phone,
                    shipping_address,
                },
            });
        }
        Ok(result)
    }

    fn absorb_order(&mut self, winner: OrderId, loser: OrderId) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE line_items SET order_id = ?1 WHERE order_id = ?2",
            rusqlite::params![winner.as_bytes().as_slice(), loser.as_bytes().as_slice()],
        )?;
        tx.execute(
            "UPDATE order_sources SET order_id = ?1 WHERE order_id = ?2",
            rusqlite::params![winner.as_bytes().as_slice(), loser.as_bytes().as_slice()],
        )?;
        let deleted = tx.execute(
            "DELETE FROM orders WHERE order_id = ?1",
            rusqlite::params![loser.as_bytes().as_slice()],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("order {loser}")));
        }
        tx.commit()?;
        Ok(())
    }

    fn insert_line_item(&mut self, item: &LineItem) -> Result<(), StoreError> {
        let result = self.conn.execute(
            "INSERT INTO line_items (item_id, order_id, product_id, source_kind, source_line_id, \
             quantity, unit_price, refund_state, restocked, status, edition_number, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            rusqlite::params![
                item.id.as_bytes().as_slice(),
                item.order_id.as_bytes().as_slice(),
                item.product_id.as_bytes().as_slice(),
                item.source.kind.as_str(),
                item.source.id,
                item.quantity,
                item.unit_price.to_string(),
                item.refund_state.as_str(),
                item.restocked,
                item.status.as_str(),
                item.edition_number,
                to_millis(item.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::ConstraintViolation(format!(
                    "line item {} ({}:{})",
                    item.id,
                    item.source.kind.as_str(),
                    item.source.id
                )))
            }
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn find_item_by_source_line(
        &self,
        source_kind: &str,
        source_line_id: &str,
    ) -> Result<Option<LineItemId>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id FROM line_items WHERE source_kind = ?1 AND source_line_id = ?2",
        )?;
        let mut rows = stmt.query_map(rusqlite::params![source_kind, source_line_id], |row| {
            let bytes: Vec<u8> = row.get(0)?;
            Ok(bytes)
        })?;

        match rows.next() {
            Some(Ok(bytes)) => Ok(Some(LineItemId::from_bytes(to_array::<16>(
                bytes, "item_id",
            )?))),
            Some(Err(e)) => Err(StoreError::Sqlite(e)),
            None => Ok(None),
        }
    }

    fn update_item_flags(
        &mut self,
        item_id: LineItemId,
        refund_state: RefundState,
        restocked: bool,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE line_items SET refund_state = ?2, restocked = ?3 WHERE item_id = ?1",
            rusqlite::params![
                item_id.as_bytes().as_slice(),
                refund_state.as_str(),
                restocked,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("line item {item_id}")));
        }
        Ok(())
    }

    fn set_item_status(
        &mut self,
        item_id: LineItemId,
        status: ItemStatus,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE line_items SET status = ?2 WHERE item_id = ?1",
            rusqlite::params![item_id.as_bytes().as_slice(), status.as_str()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("line item {item_id}")));
        }
        Ok(())
    }

    fn get_items_for_order(&self, order_id: OrderId) -> Result<Vec<LineItem>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM line_items WHERE order_id = ?1 \
             ORDER BY created_at, item_id"
        ))?;
        let items = stmt
            .query_map(rusqlite::params![order_id.as_bytes().as_slice()], |row| {
                read_item(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn get_items_for_product(&self, product_id: ProductId) -> Result<Vec<LineItem>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM line_items WHERE product_id = ?1 \
             ORDER BY created_at, item_id"
        ))?;
        let items = stmt
            .query_map(rusqlite::params![product_id.as_bytes().as_slice()], |row| {
                read_item(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn active_items_in_sequence(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<LineItem>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT li.item_id, li.order_id, li.product_id, li.source_kind, li.source_line_id, \
                    li.quantity, li.unit_price, li.refund_state, li.restocked, li.status, \
                    li.edition_number, li.created_at \
             FROM line_items li JOIN orders o ON o.order_id = li.order_id \
             WHERE li.product_id = ?1 AND li.status = 'active' \
             ORDER BY o.purchase_time, li.created_at, li.item_id",
        )?;
        let items = stmt
            .query_map(rusqlite::params![product_id.as_bytes().as_slice()], |row| {
                read_item(row).map_err(tunnel)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    fn write_edition_numbers(
        &mut self,
        product_id: ProductId,
        changes: &[(LineItemId, Option<u32>)],
    ) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;

        // Two phases so a shifting batch (3 -> 2 while 2 is still taken)
        // never trips the active-edition unique index mid-write.
        for (item_id, _) in changes {
            tx.execute(
                "UPDATE line_items SET edition_number = NULL \
                 WHERE item_id = ?1 AND product_id = ?2",
                rusqlite::params![
                    item_id.as_bytes().as_slice(),
                    product_id.as_bytes().as_slice()
                ],
            )?;
        }
        for (item_id, number) in changes {
            if let Some(number) = number {
                let changed = tx.execute(
                    "UPDATE line_items SET edition_number = ?3 \
                     WHERE item_id = ?1 AND product_id = ?2",
                    rusqlite::params![
                        item_id.as_bytes().as_slice(),
                        product_id.as_bytes().as_slice(),
                        number,
                    ],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound(format!("line item {item_id}")));
                }
            }
        }

        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(),
            canonical_ref: SourceRef::new(SourceKind::Commerce, "c-1001"),
            display_number: "#1001".into(),
            match_key: Some("1001".into()),
            financial_state: FinancialState::Paid,
            fulfillment_state: FulfillmentState::Fulfilled,
            cancelled_at: None,
            purchase_time: from_millis(1_700_000_000_000).unwrap(),
            contact: Contact {
                email: Some("a@b.com".into()),
                ..Contact::default()
            },
        }
    }

    #[test]
    fn order_roundtrip() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let order = sample_order();
        store.insert_order(&order).unwrap();

        let loaded = store.get_order(order.id).unwrap().unwrap();
        assert_eq!(loaded.display_number, "#1001");
        assert_eq!(loaded.match_key.as_deref(), Some("1001"));
        assert_eq!(loaded.financial_state, FinancialState::Paid);
        assert_eq!(loaded.purchase_time, order.purchase_time);
        assert_eq!(loaded.contact.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn duplicate_source_line_rejected() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let order = sample_order();
        store.insert_order(&order).unwrap();
        let product = Product {
            id: ProductId::new(),
            title: "Print".into(),
            edition_total: None,
        };
        store.upsert_product(&product).unwrap();

        let item = LineItem {
            id: LineItemId::new(),
            order_id: order.id,
            product_id: product.id,
            source: SourceRef::new(SourceKind::Commerce, "line-1"),
            quantity: 1,
            unit_price: Decimal::new(15000, 2),
            refund_state: RefundState::None,
            restocked: false,
            status: ItemStatus::Inactive,
            edition_number: None,
            created_at: order.purchase_time,
        };
        store.insert_line_item(&item).unwrap();

        let dup = LineItem {
            id: LineItemId::new(),
            ..item.clone()
        };
        let err = store.insert_line_item(&dup).unwrap_err();
        assert!(matches!(err, StoreError::ConstraintViolation(_)));
    }

    #[test]
    fn absorb_reparents_items_and_sources() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let winner = sample_order();
        let mut loser = sample_order();
        loser.id = OrderId::new();
        loser.canonical_ref = SourceRef::new(SourceKind::Manual, "m-7");
        store.insert_order(&winner).unwrap();
        store.insert_order(&loser).unwrap();
        let product = Product {
            id: ProductId::new(),
            title: "Print".into(),
            edition_total: None,
        };
        store.upsert_product(&product).unwrap();

        store
            .upsert_order_source(&OrderSource {
                order_id: loser.id,
                source: loser.canonical_ref.clone(),
                contact: Contact::default(),
            })
            .unwrap();
        store
            .insert_line_item(&LineItem {
                id: LineItemId::new(),
                order_id: loser.id,
                product_id: product.id,
                source: SourceRef::new(SourceKind::Manual, "m-line-1"),
                quantity: 1,
                unit_price: Decimal::new(9900, 2),
                refund_state: RefundState::None,
                restocked: false,
                status: ItemStatus::Inactive,
                edition_number: None,
                created_at: loser.purchase_time,
            })
            .unwrap();

        store.absorb_order(winner.id, loser.id).unwrap();

        assert!(store.get_order(loser.id).unwrap().is_none());
        let items = store.get_items_for_order(winner.id).unwrap();
        assert_eq!(items.len(), 1);
        let sources = store.get_sources(winner.id).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source.id, "m-7");
    }

    #[test]
    fn edition_batch_shifts_without_collision() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let order = sample_order();
        store.insert_order(&order).unwrap();
        let product = Product {
            id: ProductId::new(),
            title: "Print".into(),
            edition_total: Some(10),
        };
        store.upsert_product(&product).unwrap();

        let mut ids = Vec::new();
        for n in 1..=3u32 {
            let item = LineItem {
                id: LineItemId::new(),
                order_id: order.id,
                product_id: product.id,
                source: SourceRef::new(SourceKind::Commerce, format!("line-{n}")),
                quantity: 1,
                unit_price: Decimal::new(100, 0),
                refund_state: RefundState::None,
                restocked: false,
                status: ItemStatus::Active,
                edition_number: Some(n),
                created_at: order.purchase_time,
            };
            store.insert_line_item(&item).unwrap();
            ids.push(item.id);
        }

        // Drop number 1, shift 2 and 3 down. Both phases in one batch.
        store
            .write_edition_numbers(
                product.id,
                &[(ids[0], None), (ids[1], Some(1)), (ids[2], Some(2))],
            )
            .unwrap();

        let items = store.get_items_for_product(product.id).unwrap();
        let numbers: Vec<Option<u32>> = ids
            .iter()
            .map(|id| items.iter().find(|i| i.id == *id).unwrap().edition_number)
            .collect();
        assert_eq!(numbers, vec![None, Some(1), Some(2)]);
    }
}
