use kernel_memory_addresses::PhysicalAddress;
use kernel_registers::cr0::Cr0;
use kernel_registers::cr2::Cr2;
use kernel_registers::cr3::Cr3;

#[test]
fn paging_bit_is_bit_31() {
    let cr0 = Cr0::from_bits(0x0000_0011).with_pg_paging(true);
    assert_eq!(cr0.into_bits(), 0x8000_0011);
    assert!(cr0.pe_protection_enable());
}

#[test]
fn cr3_holds_directory_frame() {
    let cr3 = Cr3::from_directory_phys(PhysicalAddress::new(0x0040_0000));
    assert_eq!(cr3.into_bits(), 0x0040_0000);
    assert_eq!(cr3.directory_phys(), PhysicalAddress::new(0x0040_0000));
    assert!(!cr3.pwt());
}

#[test]
fn cr2_reports_fault_address() {
    let cr2 = Cr2::from_bits(0x4000_0123);
    assert_eq!(cr2.fault_address().as_u32(), 0x4000_0123);
    assert_eq!(cr2.fault_address().directory_index(), 0x100);
}
