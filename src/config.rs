use clap::Parser;

#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[clap(env, long)]
    pub environment: String,

    #[clap(env, long)]
    pub database_url: String,

    /// Comma separated list of origins allowed by CORS
    #[clap(env, long)]
    pub origin_urls: String,

    #[clap(env, long, default_value_t = 3000)]
    pub port: u16,

    #[clap(env, long, default_value = "https://www.universal-tutorial.com/api/")]
    pub places_api_url: String,

    #[clap(env, long)]
    pub places_api_token: String,

    #[clap(env, long)]
    pub places_user_email: String,

    #[clap(env, long, default_value = "https://flagcdn.com/")]
    pub flags_url: String,
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_with_defaults() {
        let config = Config::try_parse_from([
            "park-easy-backend",
            "--environment", "production",
            "--database-url", "postgres://localhost/parkeasy",
            "--origin-urls", "http://localhost:5173",
            "--places-api-token", "token",
            "--places-user-email", "ops@parkeasy.dev",
        ]).unwrap();

        assert_eq!(config.flags_url, "https://flagcdn.com/");
        assert!(config.is_production());
    }
}
