
#[allow(missing_docs)]
#[macro_export]
macro_rules! testgen_scan {
    () => {
        mod test_scan {
            use super::*;

            $crate::testgen_scan_simple!();
        }
    };
}

#[cfg(test)]
mod local {
    crate::testgen_scan!();
}
