//! `define_service!` — declare a pluggable hardware service table.
//!
//! ```ignore
//! define_service! {
//!     platform => PlatformServices {
//!         timer_ticks() -> u64;
//!         console_putc(c: u8);
//!         @no_wrapper console_puts(s: &[u8]);
//!     }
//! }
//! ```
//!
//! expands to a `PlatformServices` struct of function pointers, a
//! `platform_services()` accessor, a `register_platform(PlatformServices)`
//! setter, and one free-function wrapper per method — except methods marked
//! `@no_wrapper`, whose wrapper the caller writes by hand (used when the
//! wrapper needs logic beyond a bare call, e.g. a `-> !` return).

#[macro_export]
macro_rules! define_service {
    (
        $(#[$outer:meta])*
        $field:ident => $Services:ident {
            $(
                $(#[$mmeta:meta])*
                $(@no_wrapper $nowrap:tt)?
                $name:ident ( $($argname:ident : $argty:ty),* $(,)? ) $(-> $ret:ty)? ;
            )*
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Copy)]
        pub struct $Services {
            $(
                $(#[$mmeta])*
                pub $name: fn($($argty),*) $(-> $ret)?,
            )*
        }

        $crate::paste::paste! {
            #[allow(non_upper_case_globals)]
            static [<$field _CELL>]: $crate::service_cell::ServiceCell<$Services> =
                $crate::service_cell::ServiceCell::new();

            #[allow(dead_code)]
            pub fn [<$field _services>]() -> &'static $Services {
                [<$field _CELL>].get()
            }

            #[allow(dead_code)]
            pub fn [<register_ $field>](services: $Services) {
                [<$field _CELL>].register(services);
            }

            $(
                $crate::define_service!(@wrapper [<$field _services>] $(@no_wrapper $nowrap)? $name, ($($argname : $argty),*) $(-> $ret)?);
            )*
        }
    };

    (@wrapper $accessor:ident @no_wrapper $tt:tt $name:ident, ($($argname:ident : $argty:ty),*) $(-> $ret:ty)?) => {};

    (@wrapper $accessor:ident $name:ident, ($($argname:ident : $argty:ty),*) $(-> $ret:ty)?) => {
        #[inline(always)]
        #[allow(dead_code)]
        pub fn $name($($argname: $argty),*) $(-> $ret)? {
            ($accessor().$name)($($argname),*)
        }
    };
}
