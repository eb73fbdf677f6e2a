//! Column bindings for row-array fetches.
//!
//! After execute, every result column gets a [`ColumnBinding`]: one
//! contiguous buffer with a fixed-width slot per row plus one indicator per
//! row. The buffers are registered with `SQLBindCol`, so each `SQLFetch`
//! writes up to `capacity` rows straight into them. A [`BindingSet`] holds the
//! bindings of one execution in column order and decodes filled buffers into
//! rows.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use super::connect::{ConnectParams, NarrowEncoding};
use super::decode::{decode_i32, decode_i64, decode_narrow_text, decode_wide_text};
use super::diagnostics::{check, Target};
use super::types::{classify, Column, ColumnDescriptor, ColumnInfo, ElementKind, ElementLayout, Row, Value};
use super::{Driver, Handle, HandleType};
use crate::error::{Error, ErrorKind, Result};

/// Owning buffer of `capacity` fixed-width slots.
///
/// Row `i` occupies bytes `[i * width, (i + 1) * width)`. All access goes
/// through the bounds-checked accessors.
#[derive(Debug)]
pub struct ColumnBuffer {
    data: BytesMut,
    width: usize,
    capacity: usize,
}

impl ColumnBuffer {
    /// Allocate a zeroed buffer.
    ///
    /// Returns `None` when `width * capacity` overflows or the allocation fails.
    pub fn new(width: usize, capacity: usize) -> Option<Self> {
        let data = zeroed::<u8>(width.checked_mul(capacity)?)?;
        Some(Self {
            data: BytesMut::from(Bytes::from(data)),
            width,
            capacity,
        })
    }

    /// Slot width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Full slot of a row.
    pub fn slot(&self, row: usize) -> Result<&[u8]> {
        if row >= self.capacity {
            return Err(Error::SlotOutOfBounds {
                row,
                capacity: self.capacity,
            });
        }
        let start = row * self.width;
        Ok(&self.data[start..start + self.width])
    }

    /// First `len` bytes of a row's slot.
    pub fn value_bytes(&self, row: usize, len: usize) -> Result<&[u8]> {
        let slot = self.slot(row)?;
        slot.get(..len).ok_or(Error::SlotOutOfBounds {
            row,
            capacity: self.capacity,
        })
    }

    /// Mutable slot of a row.
    pub fn slot_mut(&mut self, row: usize) -> Result<&mut [u8]> {
        if row >= self.capacity {
            return Err(Error::SlotOutOfBounds {
                row,
                capacity: self.capacity,
            });
        }
        let start = row * self.width;
        Ok(&mut self.data[start..start + self.width])
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.data.as_mut_ptr()
    }
}

fn zeroed<T: Clone + Default>(len: usize) -> Option<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len).ok()?;
    data.resize(len, T::default());
    Some(data)
}

/// Buffer and indicators bound to one result column.
#[derive(Debug)]
pub struct ColumnBinding {
    /// 1-based column number.
    number: u16,
    descriptor: ColumnDescriptor,
    layout: ElementLayout,
    buffer: ColumnBuffer,
    indicators: Vec<i64>,
}

impl ColumnBinding {
    /// Classify a column and allocate its buffers.
    ///
    /// Text sizes are resolved with [`ConnectParams::bound_text_length`], so
    /// unknown and oversized declarations get `long_text_length` characters.
    /// Buffers that cannot be allocated are reported as `Error::Allocation`.
    pub fn new(
        number: u16,
        descriptor: ColumnDescriptor,
        capacity: usize,
        params: &ConnectParams,
    ) -> Result<Self> {
        let declared = params.bound_text_length(descriptor.column_size);
        let layout = classify(number, descriptor.data_type, declared)?;
        let buffer = ColumnBuffer::new(layout.width, capacity).ok_or_else(|| {
            Error::buffer_allocation(
                number,
                format!("{} rows of {} bytes", capacity, layout.width),
            )
        })?;
        let indicators = zeroed::<i64>(capacity).ok_or_else(|| {
            Error::buffer_allocation(number, format!("{} indicators", capacity))
        })?;
        Ok(Self {
            number,
            descriptor,
            layout,
            buffer,
            indicators,
        })
    }

    /// 1-based column number.
    pub fn number(&self) -> u16 {
        self.number
    }

    /// Column metadata this binding was built from.
    pub fn descriptor(&self) -> &ColumnDescriptor {
        &self.descriptor
    }

    /// Buffer layout.
    pub fn layout(&self) -> &ElementLayout {
        &self.layout
    }

    /// Element kind.
    pub fn kind(&self) -> ElementKind {
        self.layout.kind
    }

    /// Number of row slots.
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Bound value buffer.
    pub fn buffer(&self) -> &ColumnBuffer {
        &self.buffer
    }

    /// Indicator of a row slot.
    pub fn indicator(&self, row: usize) -> Result<i64> {
        self.indicators
            .get(row)
            .copied()
            .ok_or(Error::SlotOutOfBounds {
                row,
                capacity: self.indicators.len(),
            })
    }

    /// Store a value and its indicator the way a driver would.
    #[cfg(test)]
    pub(crate) fn write_slot(&mut self, row: usize, bytes: &[u8], indicator: i64) -> Result<()> {
        let slot = self.buffer.slot_mut(row)?;
        let n = bytes.len().min(slot.len());
        slot[..n].copy_from_slice(&bytes[..n]);
        self.indicators[row] = indicator;
        Ok(())
    }

    /// Register buffer and indicators with `SQLBindCol`.
    ///
    /// # Safety
    ///
    /// The driver keeps both pointers. The binding must not be dropped until
    /// the statement has been unbound (`FreeStmtOption::Unbind`) or freed, and
    /// the statement's row array size must not exceed `capacity`.
    pub unsafe fn bind<D: Driver + ?Sized>(&mut self, driver: &D, stmt: Handle) -> Result<()> {
        let status = driver.bind_col(
            stmt,
            self.number,
            self.layout.c_type,
            self.buffer.as_mut_ptr(),
            self.layout.width,
            self.indicators.as_mut_ptr(),
        );
        check(
            driver,
            Target::new(HandleType::Stmt, stmt),
            ErrorKind::Bind,
            "bind column",
            status,
        )
        .map_err(|e| e.for_column(self.number))
    }

    /// Decode one row slot.
    ///
    /// Every negative indicator decodes as `Value::Null`, including
    /// `SQL_NO_TOTAL`, which drivers only report for unbound or streamed data.
    pub fn value_at(&self, row: usize, encoding: NarrowEncoding) -> Result<Value> {
        let indicator = self.indicator(row)?;
        if indicator < 0 {
            return Ok(Value::Null);
        }
        match self.layout.kind {
            ElementKind::Int32 => decode_i32(self.buffer.slot(row)?).map(Value::Int32),
            ElementKind::Int64 => decode_i64(self.buffer.slot(row)?).map(Value::Int64),
            ElementKind::FixedText => {
                let bytes = self.text_bytes(row, indicator)?;
                decode_narrow_text(bytes, encoding)
                    .map(Value::Text)
                    .map_err(|e| self.invalid_text(row, e))
            }
            ElementKind::WideText => {
                let bytes = self.text_bytes(row, indicator)?;
                decode_wide_text(bytes)
                    .map(Value::Text)
                    .map_err(|e| self.invalid_text(row, e))
            }
        }
    }

    /// Decode the first `rows` slots.
    pub fn decode(&self, rows: usize, encoding: NarrowEncoding) -> Result<Vec<Value>> {
        (0..rows).map(|row| self.value_at(row, encoding)).collect()
    }

    fn text_bytes(&self, row: usize, indicator: i64) -> Result<&[u8]> {
        let length = indicator as usize;
        let capacity = self.layout.max_value_length();
        if length > capacity {
            return Err(Error::Truncated {
                column: self.number,
                row,
                length,
                capacity,
            });
        }
        self.buffer.value_bytes(row, length)
    }

    fn invalid_text(&self, row: usize, err: Error) -> Error {
        match err {
            Error::TypeConversion { message } => Error::InvalidText {
                column: self.number,
                row,
                message,
            },
            other => other,
        }
    }
}

/// Bindings of every result column of one execution, in column order.
#[derive(Debug)]
pub struct BindingSet {
    bindings: Vec<ColumnBinding>,
    capacity: usize,
    column_info: Arc<ColumnInfo>,
}

impl BindingSet {
    /// Allocate bindings for the given columns, all with the same capacity.
    pub fn new(
        descriptors: Vec<ColumnDescriptor>,
        capacity: usize,
        params: &ConnectParams,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidArraySize { size: capacity });
        }
        let bindings = descriptors
            .into_iter()
            .zip(1u16..)
            .map(|(descriptor, number)| {
                ColumnBinding::new(number, descriptor, capacity, params)
            })
            .collect::<Result<Vec<_>>>()?;
        let column_info = Arc::new(ColumnInfo::new(
            bindings
                .iter()
                .map(|b| Column::new(&b.descriptor, b.kind()))
                .collect(),
        ));
        Ok(Self {
            bindings,
            capacity,
            column_info,
        })
    }

    /// Empty set, for statements without a result set.
    pub fn empty(capacity: usize) -> Self {
        Self {
            bindings: Vec::new(),
            capacity,
            column_info: Arc::new(ColumnInfo::default()),
        }
    }

    /// Register every binding with the driver, in column order.
    ///
    /// Stops at the first failure; bindings registered before it stay bound.
    ///
    /// # Safety
    ///
    /// Same contract as [`ColumnBinding::bind`] for every binding in the set.
    pub unsafe fn bind_all<D: Driver + ?Sized>(&mut self, driver: &D, stmt: Handle) -> Result<()> {
        for binding in &mut self.bindings {
            binding.bind(driver, stmt)?;
        }
        tracing::debug!(
            columns = self.bindings.len(),
            capacity = self.capacity,
            "bound result columns"
        );
        Ok(())
    }

    /// Number of bound columns.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Check if the set has no columns.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Rows per fetch shared by every binding.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shared column information.
    pub fn column_info(&self) -> &Arc<ColumnInfo> {
        &self.column_info
    }

    /// Binding by 0-based index.
    pub fn get(&self, index: usize) -> Option<&ColumnBinding> {
        self.bindings.get(index)
    }

    /// Mutable binding by 0-based index.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ColumnBinding> {
        self.bindings.get_mut(index)
    }

    /// Iterate over bindings.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnBinding> {
        self.bindings.iter()
    }

    /// Decode the first `rows` row slots of every column into rows.
    ///
    /// Columns are decoded one at a time, then transposed so that row `i`
    /// holds the `i`-th value of each column in column order.
    pub fn decode_rows(&self, rows: usize, encoding: NarrowEncoding) -> Result<Vec<Row>> {
        if rows > self.capacity {
            return Err(Error::SlotOutOfBounds {
                row: rows - 1,
                capacity: self.capacity,
            });
        }
        let columns = self
            .bindings
            .iter()
            .map(|b| b.decode(rows, encoding))
            .collect::<Result<Vec<_>>>()?;

        let mut columns: Vec<_> = columns.into_iter().map(Vec::into_iter).collect();
        Ok((0..rows)
            .map(|_| {
                let values = columns
                    .iter_mut()
                    .map(|col| col.next().unwrap_or(Value::Null))
                    .collect();
                Row::new(values, Arc::clone(&self.column_info))
            })
            .collect())
    }
}
