pub mod gdt;
pub mod idt;
pub mod pit;

pub fn init() {
    gdt::init();
    idt::init();
    unsafe { idt::PICS.lock().initialize() };
    pit::init();
}
