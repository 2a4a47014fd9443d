/// Modbus register bank for server-side data storage
///
/// This module provides thread-safe storage for the four Modbus data kinds:
/// coils, discrete inputs, holding registers and input registers.
///
/// Tables are sparse: each entry is an independent (address, value) pair
/// created by an explicit `configure_*` call, and addresses within a table
/// do not have to be contiguous. Lookups are linear scans comparing address
/// equality; the first match wins, and nothing guards against duplicate
/// addresses; configuring the same address twice is a caller error.
///
/// The bank clones cheaply (the tables are shared), so the application can
/// keep a handle and mutate values between server polls.

use std::sync::{Arc, RwLock};

use crate::error::{ModbusError, ModbusResult};

/// Default capacity cap for the coils table
pub const DEFAULT_COILS_CAPACITY: usize = 100;
/// Default capacity cap for the discrete inputs table
pub const DEFAULT_DISCRETE_INPUTS_CAPACITY: usize = 100;
/// Default capacity cap for the holding registers table
pub const DEFAULT_HOLDING_REGISTERS_CAPACITY: usize = 100;
/// Default capacity cap for the input registers table
pub const DEFAULT_INPUT_REGISTERS_CAPACITY: usize = 100;

/// One sparse table entry
#[derive(Debug, Clone, Copy)]
struct Entry<V> {
    address: u16,
    value: V,
}

/// A sparse, insertion-ordered table of (address, value) pairs
#[derive(Debug)]
struct Table<V> {
    entries: Arc<RwLock<Vec<Entry<V>>>>,
    capacity: usize,
}

impl<V> Clone for Table<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            capacity: self.capacity,
        }
    }
}

impl<V: Copy + Default> Table<V> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(Vec::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append `quantity` zero-valued entries at consecutive addresses
    ///
    /// Repeated calls append, which is how non-contiguous address sets are
    /// built. Refused when the capacity cap would be exceeded.
    fn configure(&self, start_address: u16, quantity: u16) -> ModbusResult<()> {
        let mut entries = self.entries.write().unwrap();
        if entries.len() + quantity as usize > self.capacity {
            return Err(ModbusError::configuration(format!(
                "table capacity exceeded: {} + {} > {}",
                entries.len(),
                quantity,
                self.capacity
            )));
        }
        for i in 0..quantity {
            entries.push(Entry {
                address: start_address.wrapping_add(i),
                value: V::default(),
            });
        }
        Ok(())
    }

    /// Linear-search read; first match wins
    fn read(&self, address: u16) -> ModbusResult<V> {
        let entries = self.entries.read().unwrap();
        entries
            .iter()
            .find(|entry| entry.address == address)
            .map(|entry| entry.value)
            .ok_or_else(|| ModbusError::invalid_address(address, 1))
    }

    /// Linear-search write; first match wins
    fn write(&self, address: u16, value: V) -> ModbusResult<()> {
        let mut entries = self.entries.write().unwrap();
        match entries.iter_mut().find(|entry| entry.address == address) {
            Some(entry) => {
                entry.value = value;
                Ok(())
            }
            None => Err(ModbusError::invalid_address(address, 1)),
        }
    }

    /// Write the same value to `count` consecutive addresses
    ///
    /// A missing address downgrades the result to an error but does NOT
    /// roll back or stop the remaining writes: every present address in the
    /// range still gets the value.
    fn write_range(&self, start_address: u16, value: V, count: u16) -> ModbusResult<()> {
        let mut failed = false;
        for i in 0..count {
            if self.write(start_address.wrapping_add(i), value).is_err() {
                failed = true;
            }
        }
        if failed {
            Err(ModbusError::invalid_address(start_address, count))
        } else {
            Ok(())
        }
    }

    fn is_present(&self, address: u16) -> bool {
        let entries = self.entries.read().unwrap();
        entries.iter().any(|entry| entry.address == address)
    }

    /// Every address in `[start, start + count)` has an entry
    fn is_range_present(&self, start_address: u16, count: u16) -> bool {
        (0..count).all(|i| self.is_present(start_address.wrapping_add(i)))
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }
}

/// Thread-safe sparse register bank for Modbus servers
#[derive(Debug, Clone)]
pub struct ModbusRegisterBank {
    coils: Table<bool>,
    discrete_inputs: Table<bool>,
    holding_registers: Table<u16>,
    input_registers: Table<u16>,
}

impl ModbusRegisterBank {
    /// Create a new register bank with the default capacity caps
    pub fn new() -> Self {
        Self::with_capacities(
            DEFAULT_COILS_CAPACITY,
            DEFAULT_DISCRETE_INPUTS_CAPACITY,
            DEFAULT_HOLDING_REGISTERS_CAPACITY,
            DEFAULT_INPUT_REGISTERS_CAPACITY,
        )
    }

    /// Create a new register bank with custom per-kind capacity caps
    pub fn with_capacities(
        coils_capacity: usize,
        discrete_inputs_capacity: usize,
        holding_registers_capacity: usize,
        input_registers_capacity: usize,
    ) -> Self {
        Self {
            coils: Table::new(coils_capacity),
            discrete_inputs: Table::new(discrete_inputs_capacity),
            holding_registers: Table::new(holding_registers_capacity),
            input_registers: Table::new(input_registers_capacity),
        }
    }

    /// Append `quantity` coils starting at `start_address`, each OFF
    pub fn configure_coils(&self, start_address: u16, quantity: u16) -> ModbusResult<()> {
        self.coils.configure(start_address, quantity)
    }

    /// Append `quantity` discrete inputs starting at `start_address`, each OFF
    pub fn configure_discrete_inputs(&self, start_address: u16, quantity: u16) -> ModbusResult<()> {
        self.discrete_inputs.configure(start_address, quantity)
    }

    /// Append `quantity` holding registers starting at `start_address`, each 0
    pub fn configure_holding_registers(
        &self,
        start_address: u16,
        quantity: u16,
    ) -> ModbusResult<()> {
        self.holding_registers.configure(start_address, quantity)
    }

    /// Append `quantity` input registers starting at `start_address`, each 0
    pub fn configure_input_registers(&self, start_address: u16, quantity: u16) -> ModbusResult<()> {
        self.input_registers.configure(start_address, quantity)
    }

    /// Read a single coil
    pub fn read_coil(&self, address: u16) -> ModbusResult<bool> {
        self.coils.read(address)
    }

    /// Write a single coil
    pub fn write_coil(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.coils.write(address, value)
    }

    /// Write the same state to a run of coils (no rollback on partial failure)
    pub fn write_coil_range(&self, start_address: u16, value: bool, count: u16) -> ModbusResult<()> {
        self.coils.write_range(start_address, value, count)
    }

    /// Check if a coil exists
    pub fn is_coil_present(&self, address: u16) -> bool {
        self.coils.is_present(address)
    }

    /// Check if every coil in a range exists
    pub fn is_coil_range_present(&self, start_address: u16, count: u16) -> bool {
        self.coils.is_range_present(start_address, count)
    }

    /// Read a single discrete input
    pub fn read_discrete_input(&self, address: u16) -> ModbusResult<bool> {
        self.discrete_inputs.read(address)
    }

    /// Write a single discrete input (application side; read-only on the wire)
    pub fn write_discrete_input(&self, address: u16, value: bool) -> ModbusResult<()> {
        self.discrete_inputs.write(address, value)
    }

    /// Write the same state to a run of discrete inputs (no rollback)
    pub fn write_discrete_input_range(
        &self,
        start_address: u16,
        value: bool,
        count: u16,
    ) -> ModbusResult<()> {
        self.discrete_inputs.write_range(start_address, value, count)
    }

    /// Check if a discrete input exists
    pub fn is_discrete_input_present(&self, address: u16) -> bool {
        self.discrete_inputs.is_present(address)
    }

    /// Check if every discrete input in a range exists
    pub fn is_discrete_input_range_present(&self, start_address: u16, count: u16) -> bool {
        self.discrete_inputs.is_range_present(start_address, count)
    }

    /// Read a single holding register
    pub fn read_holding_register(&self, address: u16) -> ModbusResult<u16> {
        self.holding_registers.read(address)
    }

    /// Write a single holding register
    pub fn write_holding_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        self.holding_registers.write(address, value)
    }

    /// Write the same value to a run of holding registers (no rollback)
    pub fn write_holding_register_range(
        &self,
        start_address: u16,
        value: u16,
        count: u16,
    ) -> ModbusResult<()> {
        self.holding_registers.write_range(start_address, value, count)
    }

    /// Check if a holding register exists
    pub fn is_holding_register_present(&self, address: u16) -> bool {
        self.holding_registers.is_present(address)
    }

    /// Check if every holding register in a range exists
    pub fn is_holding_register_range_present(&self, start_address: u16, count: u16) -> bool {
        self.holding_registers.is_range_present(start_address, count)
    }

    /// Read a single input register
    pub fn read_input_register(&self, address: u16) -> ModbusResult<u16> {
        self.input_registers.read(address)
    }

    /// Write a single input register (application side; read-only on the wire)
    pub fn write_input_register(&self, address: u16, value: u16) -> ModbusResult<()> {
        self.input_registers.write(address, value)
    }

    /// Write the same value to a run of input registers (no rollback)
    pub fn write_input_register_range(
        &self,
        start_address: u16,
        value: u16,
        count: u16,
    ) -> ModbusResult<()> {
        self.input_registers.write_range(start_address, value, count)
    }

    /// Check if an input register exists
    pub fn is_input_register_present(&self, address: u16) -> bool {
        self.input_registers.is_present(address)
    }

    /// Check if every input register in a range exists
    pub fn is_input_register_range_present(&self, start_address: u16, count: u16) -> bool {
        self.input_registers.is_range_present(start_address, count)
    }

    /// Get register bank statistics
    pub fn stats(&self) -> RegisterBankStats {
        RegisterBankStats {
            coils_count: self.coils.len(),
            discrete_inputs_count: self.discrete_inputs.len(),
            holding_registers_count: self.holding_registers.len(),
            input_registers_count: self.input_registers.len(),
        }
    }
}

impl Default for ModbusRegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Register bank statistics
#[derive(Debug, Clone)]
pub struct RegisterBankStats {
    pub coils_count: usize,
    pub discrete_inputs_count: usize,
    pub holding_registers_count: usize,
    pub input_registers_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configure_and_read_back() {
        let bank = ModbusRegisterBank::new();
        bank.configure_coils(0x0010, 4).unwrap();
        bank.configure_holding_registers(0x006B, 2).unwrap();

        assert!(!bank.read_coil(0x0012).unwrap());
        assert_eq!(bank.read_holding_register(0x006C).unwrap(), 0);

        bank.write_coil(0x0012, true).unwrap();
        bank.write_holding_register(0x006B, 0xABCD).unwrap();
        assert!(bank.read_coil(0x0012).unwrap());
        assert_eq!(bank.read_holding_register(0x006B).unwrap(), 0xABCD);

        // Unconfigured addresses stay invalid.
        assert!(bank.read_coil(0x0020).is_err());
        assert!(bank.write_holding_register(0x0100, 1).is_err());
    }

    #[test]
    fn test_non_contiguous_addresses() {
        let bank = ModbusRegisterBank::new();
        bank.configure_input_registers(0x0001, 2).unwrap();
        bank.configure_input_registers(0x0050, 3).unwrap();

        assert!(bank.is_input_register_present(0x0002));
        assert!(bank.is_input_register_present(0x0051));
        assert!(!bank.is_input_register_present(0x0003));
        assert!(bank.is_input_register_range_present(0x0050, 3));
        assert!(!bank.is_input_register_range_present(0x0001, 3));

        let stats = bank.stats();
        assert_eq!(stats.input_registers_count, 5);
    }

    #[test]
    fn test_capacity_cap() {
        let bank = ModbusRegisterBank::with_capacities(8, 8, 8, 8);
        bank.configure_coils(0, 8).unwrap();
        assert!(bank.configure_coils(100, 1).is_err());

        // Other kinds are independent.
        bank.configure_discrete_inputs(0, 8).unwrap();
    }

    #[test]
    fn test_range_write_without_rollback() {
        let bank = ModbusRegisterBank::new();
        bank.configure_holding_registers(0x0000, 2).unwrap();
        bank.configure_holding_registers(0x0003, 1).unwrap(); // gap at 0x0002

        let result = bank.write_holding_register_range(0x0000, 0x5555, 4);
        assert!(result.is_err());

        // Writes before and after the gap stick.
        assert_eq!(bank.read_holding_register(0x0000).unwrap(), 0x5555);
        assert_eq!(bank.read_holding_register(0x0001).unwrap(), 0x5555);
        assert_eq!(bank.read_holding_register(0x0003).unwrap(), 0x5555);
    }

    #[test]
    fn test_shared_handles_see_writes() {
        let bank = ModbusRegisterBank::new();
        bank.configure_discrete_inputs(0x0000, 1).unwrap();

        let handle = bank.clone();
        handle.write_discrete_input(0x0000, true).unwrap();
        assert!(bank.read_discrete_input(0x0000).unwrap());
    }
}
