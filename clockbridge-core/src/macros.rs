#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        ::defmt::info!($($arg)*);
        ::log::info!($($arg)*);
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        ::defmt::warn!($($arg)*);
        ::log::warn!($($arg)*);
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        ::defmt::error!($($arg)*);
        ::log::error!($($arg)*);
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        ::defmt::debug!($($arg)*);
        ::log::debug!($($arg)*);
    };
}

#[macro_export]
macro_rules! trace {
    ($($arg:tt)*) => {
        ::defmt::trace!($($arg)*);
        ::log::trace!($($arg)*);
    };
}

/// Carves the peripheral singleton into one named resource group per task.
/// Each peripheral is moved out of `Peripherals` exactly once, so handing
/// the same pin or bus to two groups fails to compile.
#[macro_export]
macro_rules! split_resources {
    ($( $field:ident: $group:ident { $($name:ident: $peri:ident),* $(,)? } )*) => {
        $(
            pub struct $group {
                $( pub $name: embassy_rp::Peri<'static, embassy_rp::peripherals::$peri>, )*
            }
        )*

        /// Everything the gateway's tasks claim at boot.
        pub struct GatewayResources {
            $( pub $field: $group, )*
        }

        impl GatewayResources {
            pub fn split(p: embassy_rp::Peripherals) -> Self {
                Self {
                    $(
                        $field: $group {
                            $( $name: p.$peri.into(), )*
                        },
                    )*
                }
            }
        }
    };
}
