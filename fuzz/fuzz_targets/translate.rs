#![no_main]

use libfuzzer_sys::fuzz_target;
use sml::{ExecutionLimits, Machine, Translator};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let limits = ExecutionLimits::strict();
    if let Ok(program) = Translator::with_limits(limits.clone()).translate(source) {
        let mut machine = Machine::new(program).with_limits(limits);
        let _ = machine.execute();
    }
});
