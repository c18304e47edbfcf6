macro_rules! register_scrapers {
    (
        $(
            $module:ident => $scraper_type:ident
        ),* $(,)?
    ) => {
        // Import all scraper modules
        $(
            pub mod $module;
            pub use $module::$scraper_type;
        )*

        // Generate the enum with all scraper types
        #[derive(Clone, Debug)]
        pub enum ScraperType {
            $(
                $scraper_type($scraper_type),
            )*
        }

        // Implement Scraper trait for ScraperType enum
        impl Scraper for ScraperType {
            fn name(&self) -> &'static str {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.name(),
                    )*
                }
            }

            fn help(&self) -> &'static str {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.help(),
                    )*
                }
            }

            fn version(&self) -> f64 {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.version(),
                    )*
                }
            }

            fn enabled_by_default(&self) -> bool {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.enabled_by_default(),
                    )*
                }
            }

            fn descriptors(&self) -> Vec<Arc<Desc>> {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.descriptors(),
                    )*
                }
            }

            async fn scrape(
                &self,
                scope: &ScrapeScope,
                source: &dyn StatusSource,
                sink: &mut MetricSink,
            ) -> Result<(), ScrapeError> {
                match self {
                    $(
                        ScraperType::$scraper_type(s) => s.scrape(scope, source, sink).await,
                    )*
                }
            }
        }

        // Generate the factory function map
        pub fn all_factories() -> HashMap<&'static str, fn() -> Result<ScraperType>> {
            let mut map: HashMap<&'static str, fn() -> Result<ScraperType>> = HashMap::new();
            $(
                map.insert(
                    stringify!($module),
                    || Ok(ScraperType::$scraper_type($scraper_type::new()?)),
                );
            )*
            map
        }

        // Scraper names in declaration order, used for the collect.<name> flags
        pub const SCRAPER_NAMES: &[&'static str] = &[
            $(stringify!($module),)*
        ];
    };
}
