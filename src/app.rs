//! The `b-ec` command line front end. Every invocation loads the catalog, restores the cart and the wishlist from a
//! [`FileStorage`] directory, performs one command, and prints the notices it produced.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use clap::error::ErrorKind;
use clap::CommandFactory;
use clap::Parser;
use comfy_table::CellAlignment;
use comfy_table::Table;
use fieldx::fxstruct;
use fieldx_plus::fx_plus;
use garde::Validate;
use tracing::info;
use tracing::warn;

use crate::catalog::Catalog;
use crate::catalog::CatalogFilter;
use crate::error::StoreError;
use crate::storage::FileStorage;
use crate::storefront::Storefront;
use crate::traits::StorageBackend;
use crate::types::CartItem;
use crate::types::OrderSummary;
use crate::types::Product;
use crate::types::ProductId;

const DEMO_CATALOG: &str = include_str!("../demos/catalog.json");

#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, author, name = "b-ec")]
pub(crate) struct Cli {
    /// Directory where the cart and the wishlist are kept between runs.
    #[clap(long, short = 'd', env = "B_EC_STORAGE_DIR", default_value = ".b-ec")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    storage_dir: PathBuf,

    /// Product catalog, a JSON array of products. The bundled demo catalog is used if omitted.
    #[clap(long, short, env = "B_EC_CATALOG")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    catalog: Option<PathBuf>,

    /// How long checkout takes, in milliseconds.
    #[clap(long, env = "B_EC_CHECKOUT_DELAY_MS", default_value_t = 2000)]
    #[garde(range(max = 60_000))]
    checkout_delay_ms: u64,

    /// Tax rate applied to the cart subtotal.
    #[clap(long, env = "B_EC_TAX_RATE", default_value_t = 0.1)]
    #[garde(range(min = 0.0, max = 1.0))]
    tax_rate: f64,

    /// Do not print notices.
    #[clap(long, short, env = "B_EC_QUIET", default_value_t = false)]
    #[garde(skip)]
    quiet: bool,

    /// File to send log into
    #[clap(long, env = "B_EC_LOG_FILE")]
    #[fieldx(get(clone))]
    #[garde(skip)]
    log_file: Option<PathBuf>,

    #[clap(subcommand)]
    #[fieldx(get(clone))]
    #[garde(skip)]
    action: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub(crate) enum Command {
    /// List products, optionally filtered the way the listing page does it.
    Products {
        #[clap(long)]
        main_category: Option<String>,
        #[clap(long)]
        category: Option<String>,
        /// Listing URL query string, e.g. "mainCategory=INTERIOR&category=Kitchen".
        #[clap(long, conflicts_with_all = ["main_category", "category"])]
        query: Option<String>,
    },
    /// Show a single product.
    Product { id: ProductId },
    /// List main categories with their sub-categories.
    Sections,
    #[clap(subcommand)]
    Cart(CartCommand),
    #[clap(subcommand)]
    Wishlist(WishlistCommand),
}

#[derive(Debug, Clone, clap::Subcommand)]
pub(crate) enum CartCommand {
    Show,
    /// Add a product, bounded by what is in stock.
    Add {
        id:       ProductId,
        #[clap(default_value_t = 1, allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Set the quantity of a cart entry. Zero or less removes the entry.
    Update {
        id:       ProductId,
        #[clap(allow_negative_numbers = true)]
        quantity: i64,
    },
    Remove {
        id: ProductId,
    },
    Clear,
    Checkout,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub(crate) enum WishlistCommand {
    Show,
    Add { id: ProductId },
    Remove { id: ProductId },
    Toggle { id: ProductId },
    Clear,
    /// Put one unit of a saved product into the cart.
    ToCart { id: ProductId },
}

#[fx_plus(
    app,
    rc,
    new(private),
    sync,
    get,
    fallible(off, error(anyhow::Error)),
    builder(vis(pub))
)]
pub struct StoreApp {
    #[fieldx(inner_mut, clearer, builder("_cli_args"))]
    cli_args: Vec<String>,

    #[fieldx(lazy, private, fallible(error(clap::Error)), get(clone))]
    cli: Cli,
}

impl StoreApp {
    fn build_cli(&self) -> Result<Cli, clap::Error> {
        Ok(if let Some(custom_args) = self.clear_cli_args() {
            Cli::try_parse_from(custom_args.into_iter())?
        }
        else {
            Cli::try_parse()?
        })
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Err(err) = self.cli()?.validate() {
            let mut cmd = Cli::command();
            let err = cmd.error(ErrorKind::InvalidValue, err);

            err.exit();
        }

        Ok(())
    }

    fn setup_tracing(&self) -> anyhow::Result<()> {
        use std::io;
        use std::sync::Mutex;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let cli = self.cli()?;

        let (dest_writer, ansi) = if let Some(log_file) = cli.log_file() {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file)?;
            (Box::new(file) as Box<dyn io::Write + Send>, false)
        }
        else {
            (Box::new(io::stderr()) as Box<dyn io::Write + Send>, true)
        };

        let initialized = tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::from_default_env())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(dest_writer))
                    .with_ansi(ansi),
            )
            .try_init();

        // An embedding process may have installed its own subscriber already.
        match initialized {
            Ok(()) => info!("Tracing initialized"),
            Err(err) => warn!("Tracing left as is: {err}"),
        }

        Ok(())
    }

    async fn open_storefront(&self) -> anyhow::Result<Arc<Storefront>> {
        let cli = self.cli()?;

        let catalog = match cli.catalog() {
            Some(path) => Catalog::load(path).await?,
            None => Catalog::from_json(DEMO_CATALOG)?,
        };
        let storage: Arc<dyn StorageBackend> = Arc::new(FileStorage::new(cli.storage_dir()));

        let shop = Storefront::builder()
            .catalog(catalog)
            .storage(storage)
            .checkout_delay(Duration::from_millis(cli.checkout_delay_ms()))
            .tax_rate(cli.tax_rate())
            .build()?;
        shop.load().await;

        Ok(shop)
    }

    pub async fn execute(&self) -> anyhow::Result<()> {
        let cli = match self.cli() {
            Ok(cli) => cli,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    err.print()?;
                    return Ok(());
                }
                _ => {
                    return Err(err.into());
                }
            },
        };

        self.validate()?;
        self.setup_tracing()?;

        let shop = self.open_storefront().await?;

        match cli.action() {
            Command::Products {
                main_category,
                category,
                query,
            } => {
                let filter = match query {
                    Some(query) => CatalogFilter::from_query(&query),
                    None => CatalogFilter::new()
                        .with_main_category(main_category)
                        .with_category(category),
                };
                println!("{}", products_table(&shop.browse(&filter)));
            }
            Command::Product { id } => {
                let product = shop.product(id).ok_or(StoreError::ProductNotFound(id))?;
                println!("{}", product_table(&product));
            }
            Command::Sections => {
                let mut table = new_table(["Section", "Path", "Categories"]);
                for section in shop.catalog().sections() {
                    table.add_row([
                        section.label.clone(),
                        section.path.clone(),
                        section.categories.join(", "),
                    ]);
                }
                println!("{table}");
            }
            Command::Cart(command) => self.cart_command(&shop, command).await?,
            Command::Wishlist(command) => self.wishlist_command(&shop, command).await?,
        }

        if !cli.quiet() {
            for notice in shop.notices().active() {
                println!("[{}] {}", notice.kind, notice.message);
            }
        }

        Ok(())
    }

    async fn cart_command(&self, shop: &Storefront, command: CartCommand) -> anyhow::Result<()> {
        match command {
            CartCommand::Show => {
                let cart = shop.cart();
                if cart.is_empty() {
                    println!("Your cart is empty");
                }
                else {
                    println!("{}", cart_table(&cart.items(), &shop.order_summary()));
                }
            }
            CartCommand::Add { id, quantity } => {
                shop.product(id).ok_or(StoreError::ProductNotFound(id))?;
                shop.add_to_cart(id, quantity).await;
            }
            CartCommand::Update { id, quantity } => shop.cart().update_quantity(id, quantity).await,
            CartCommand::Remove { id } => shop.cart().remove(id).await,
            CartCommand::Clear => shop.cart().clear().await,
            CartCommand::Checkout => {
                let receipt = shop.checkout().await?;
                println!("{}", cart_table(&receipt.items, &receipt.summary));
                println!("Order placed at {}", receipt.placed_at.to_rfc3339());
            }
        }
        Ok(())
    }

    async fn wishlist_command(&self, shop: &Storefront, command: WishlistCommand) -> anyhow::Result<()> {
        match command {
            WishlistCommand::Show => {
                let wishlist = shop.wishlist();
                if wishlist.is_empty() {
                    println!("Your wishlist is empty");
                }
                else {
                    println!("{}", products_table(&wishlist.items()));
                }
            }
            WishlistCommand::Add { id } => {
                shop.add_to_wishlist(id).await?;
            }
            WishlistCommand::Remove { id } => {
                shop.wishlist().remove(id).await;
            }
            WishlistCommand::Toggle { id } => {
                shop.toggle_wishlist(id).await.ok_or(StoreError::ProductNotFound(id))?;
            }
            WishlistCommand::Clear => shop.wishlist().clear().await,
            WishlistCommand::ToCart { id } => {
                if !shop.move_to_cart(id).await {
                    bail!("Product {id} is not in the wishlist");
                }
            }
        }
        Ok(())
    }

    pub async fn run() -> anyhow::Result<()> {
        StoreApp::__fieldx_new().execute().await
    }
}

impl StoreAppBuilder {
    pub fn cli_args<S: ToString>(self, args: Vec<S>) -> Self {
        self._cli_args(args.into_iter().map(|s| s.to_string()).collect())
    }
}

impl Debug for StoreApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreApp {{ ... }}")
    }
}

fn new_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::ASCII_FULL_CONDENSED)
        .set_header(header);
    table
}

fn align_right(table: &mut Table, columns: &[usize]) {
    for col in columns {
        if let Some(column) = table.column_mut(*col) {
            column.set_cell_alignment(CellAlignment::Right);
        }
    }
}

fn price_label(product: &Product) -> String {
    if product.has_discount() {
        format!("{:.2} (-{}%)", product.discounted_price(), product.discount)
    }
    else {
        format!("{:.2}", product.price)
    }
}

fn products_table(products: &[Product]) -> Table {
    let mut table = new_table(["ID", "Name", "Section", "Category", "Price", "Stock"]);
    for product in products {
        table.add_row([
            product.id.to_string(),
            product.name.clone(),
            product.main_category.clone(),
            product.category.clone(),
            price_label(product),
            if product.in_stock() {
                product.stock.to_string()
            }
            else {
                "out of stock".to_string()
            },
        ]);
    }
    align_right(&mut table, &[0, 4, 5]);
    table
}

fn product_table(product: &Product) -> Table {
    let mut table = new_table(["", ""]);
    table
        .add_row(["ID".to_string(), product.id.to_string()])
        .add_row(["Name".to_string(), product.name.clone()])
        .add_row([
            "Category".to_string(),
            format!("{} / {}", product.main_category, product.category),
        ])
        .add_row(["Price".to_string(), price_label(product)])
        .add_row(["Rating".to_string(), format!("{:.1}", product.rating)])
        .add_row(["Stock".to_string(), product.stock.to_string()])
        .add_row(["Description".to_string(), product.description.clone()]);
    table
}

fn cart_table(items: &[CartItem], summary: &OrderSummary) -> Table {
    let mut table = new_table(["ID", "Product", "Qty", "Unit", "Line"]);
    for item in items {
        let (name, unit) = match &item.product {
            Some(product) => (product.name.clone(), format!("{:.2}", product.discounted_price())),
            None => ("(unavailable)".to_string(), "-".to_string()),
        };
        table.add_row([
            item.product_id.to_string(),
            name,
            item.quantity.to_string(),
            unit,
            format!("{:.2}", item.line_total()),
        ]);
    }

    let summary_row = |label: &str, value: String| [String::new(), label.to_string(), String::new(), String::new(), value];
    table
        .add_row(summary_row("Subtotal", format!("{:.2}", summary.subtotal)))
        .add_row(summary_row("Shipping", "Free".to_string()))
        .add_row(summary_row("Tax", format!("{:.2}", summary.tax)))
        .add_row(summary_row("Total", format!("{:.2}", summary.total)));

    align_right(&mut table, &[0, 2, 3, 4]);
    table
}
